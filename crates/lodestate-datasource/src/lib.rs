//! Lodestate Datasource - Async Composition Layer
//!
//! Builds complete, observable resources out of the synchronous reconcilers
//! in `lodestate-core`:
//!
//! - [`LoadRequestEmitter`]: the stream of load requests (simple or recurring)
//! - [`LoaderSource`]: runs an async loader per request on tokio, latest wins
//! - [`PersistedCacheSource`]: serves persisted states per request
//! - [`Datasource`]: the facade owning the whole pipeline
//!
//! ```ignore
//! let datasource = DatasourceBuilder::new(fetch_inbox)
//!     .persister(Arc::new(store), InboxError::CacheMiss)
//!     .initial_request(LoadRequest::initial(session))
//!     .build()?;
//!
//! let _sub = datasource.observe_with(|state| render(state));
//! datasource.refresh(session, false).await?;
//! ```

#![forbid(unsafe_code)]

/// Persisted cache source
pub mod cache_source;

/// Datasource configuration
pub mod config;

/// Datasource facade
pub mod datasource;

/// Load request emitters
pub mod emitter;

/// Loader-backed primary source
pub mod loader_source;

/// Tracing initialisation
pub mod logging;

mod tasks;

pub use cache_source::PersistedCacheSource;
pub use config::{DatasourceConfig, RetentionMode};
pub use datasource::{Datasource, DatasourceBuilder, LoadingEnded};
pub use emitter::{LoadRequestEmitter, RecurringLoadRequestEmitter, SimpleLoadRequestEmitter};
pub use loader_source::{LoadFuture, Loader, LoaderSource};
pub use logging::init_tracing;
