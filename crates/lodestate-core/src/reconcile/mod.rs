//! # Reconcilers
//!
//! - [`DualSourceReconciler`]: primary + cache + load requests into one
//!   authoritative state, primary results first.
//! - [`FallbackRetentionReconciler`]: one producer, retaining the last
//!   success or error as fallback while loading or failing.
//! - [`PersistenceTrigger`]: writes each distinct successful state once.
//!
//! The dual-source and retention algorithms look alike but differ in how
//! they treat an error next to a known value, and are kept separate.

mod dual;
mod persist;
mod retention;

pub use dual::{combine, CachedComponents, DualSourceReconciler};
pub use persist::{PersistenceTrigger, PersistingObservable, StatePersister};
pub use retention::{FallbackRetention, FallbackRetentionReconciler, LatestResult};
