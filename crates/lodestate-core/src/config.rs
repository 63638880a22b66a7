//! Configuration for reconcilers
//!
//! Configuration types implement [`LodestateConfig`]: defaults, loading from
//! `.toml`/`.json` files, `LODESTATE_`-prefixed environment overrides,
//! merging, validation and `key=value` overrides.

use crate::errors::{LodestateError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "LODESTATE_";

/// Core trait for lodestate configuration types
pub trait LodestateConfig: Clone + Default + Send + Sync + 'static {
    /// Get default configuration values
    fn defaults() -> Self {
        Self::default()
    }

    /// Load configuration from a `.toml` or `.json` file
    fn load_from_file(path: &Path) -> Result<Self>;

    /// Apply `LODESTATE_*` environment variable overrides
    fn merge_with_env(&mut self) -> Result<()>;

    /// Take every non-default value from `other`
    fn merge_with(&mut self, other: &Self) -> Result<()>;

    /// Validate the configuration
    fn validate(&self) -> Result<()>;

    /// Set a configuration value from a string
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Deserialize a configuration file, picking the format from its extension.
pub fn load_config_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LodestateError::internal(format!("Failed to read config file: {e}")))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(toml::from_str(&content)?),
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| LodestateError::invalid(format!("Invalid JSON: {e}"))),
        _ => Err(LodestateError::invalid("Unsupported file format")),
    }
}

/// Parse a boolean override, naming `key` in the error.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .map_err(|_| LodestateError::invalid(format!("Invalid boolean for {key}")))
}

/// Read `LODESTATE_<name>` if set.
pub fn env_override(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

/// Reconciler behavior switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Suppress an emission equal to the previously emitted state
    pub skip_repeated_states: bool,
    /// Keep a retained success value when a compatible error arrives
    pub prefer_fallback_value_over_error: bool,
    /// Log every provisioning-state transition at debug level
    pub trace_transitions: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            skip_repeated_states: true,
            prefer_fallback_value_over_error: false,
            trace_transitions: false,
        }
    }
}

impl LodestateConfig for ReconcilerConfig {
    fn load_from_file(path: &Path) -> Result<Self> {
        load_config_file(path)
    }

    fn merge_with_env(&mut self) -> Result<()> {
        if let Some(value) = env_override("SKIP_REPEATED_STATES") {
            self.skip_repeated_states = parse_bool("LODESTATE_SKIP_REPEATED_STATES", &value)?;
        }
        if let Some(value) = env_override("PREFER_FALLBACK_VALUE_OVER_ERROR") {
            self.prefer_fallback_value_over_error =
                parse_bool("LODESTATE_PREFER_FALLBACK_VALUE_OVER_ERROR", &value)?;
        }
        if let Some(value) = env_override("TRACE_TRANSITIONS") {
            self.trace_transitions = parse_bool("LODESTATE_TRACE_TRANSITIONS", &value)?;
        }
        Ok(())
    }

    fn merge_with(&mut self, other: &Self) -> Result<()> {
        let defaults = Self::default();
        if other.skip_repeated_states != defaults.skip_repeated_states {
            self.skip_repeated_states = other.skip_repeated_states;
        }
        if other.prefer_fallback_value_over_error != defaults.prefer_fallback_value_over_error {
            self.prefer_fallback_value_over_error = other.prefer_fallback_value_over_error;
        }
        if other.trace_transitions != defaults.trace_transitions {
            self.trace_transitions = other.trace_transitions;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        // Every combination of switches is meaningful.
        Ok(())
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "skip-repeated-states" | "skip_repeated_states" => {
                self.skip_repeated_states = parse_bool(key, value)?;
            }
            "prefer-fallback-value-over-error" | "prefer_fallback_value_over_error" => {
                self.prefer_fallback_value_over_error = parse_bool(key, value)?;
            }
            "trace-transitions" | "trace_transitions" => {
                self.trace_transitions = parse_bool(key, value)?;
            }
            _ => {
                return Err(LodestateError::invalid(format!(
                    "Unknown configuration key: {key}"
                )))
            }
        }
        Ok(())
    }
}
