//! Lodestate Testing Infrastructure
//!
//! Common fixtures and recording collaborators shared by the test suites of
//! the lodestate crates.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! Add this to your crate's `Cargo.toml` dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! lodestate-testkit = { workspace = true }
//! ```
//!
//! Then in your tests:
//! ```rust,no_run
//! use lodestate_testkit::*;
//!
//! #[test]
//! fn my_test() {
//!     let request = request_for("ann");
//!     let state = success("inbox", &request);
//!     assert_has_value!(state, "inbox");
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod observer;
pub mod persister;
pub mod strategies;

pub use fixtures::*;
pub use observer::RecordingObserver;
pub use persister::RecordingPersister;

/// Install a test-friendly tracing subscriber.
///
/// Safe to call from every test; only the first call installs anything.
/// Honors `RUST_LOG`, defaulting to `debug` for the lodestate crates.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("lodestate_core=debug,lodestate_datasource=debug")
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
