//! Tracing initialisation

use lodestate_core::{LodestateError, Result};
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `filter`.
///
/// `RUST_LOG` takes precedence when set. Returns `Ok(false)` if a global
/// subscriber was already installed, so calling this more than once is
/// harmless.
pub fn init_tracing(filter: &str) -> Result<bool> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| LodestateError::invalid(format!("Invalid log filter: {e}")))?,
    };
    Ok(tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_ok())
}
