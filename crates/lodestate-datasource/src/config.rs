//! Datasource configuration

use lodestate_core::config::{env_override, load_config_file, LodestateConfig};
use lodestate_core::{LodestateError, ReconcilerConfig, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Whether the datasource output retains the last result as fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionMode {
    /// Forward reconciled states as they are
    None,
    /// Run the output through a fallback-retention reconciler
    #[default]
    Combine,
}

impl FromStr for RetentionMode {
    type Err = LodestateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "combine" => Ok(Self::Combine),
            other => Err(LodestateError::invalid(format!(
                "Invalid retention mode: {other}"
            ))),
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Combine => write!(f, "combine"),
        }
    }
}

/// Configuration of a [`Datasource`](crate::Datasource)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasourceConfig {
    /// Reconciler switches, shared by every reconciler of the datasource
    pub reconciler: ReconcilerConfig,
    /// Fallback retention on the output
    pub retention: RetentionMode,
    /// Re-emit the latest load request at this period
    pub recurring_interval_ms: Option<u64>,
    /// `tracing` filter directive used by [`init_tracing`](crate::logging::init_tracing)
    pub log_filter: String,
}

impl Default for DatasourceConfig {
    fn default() -> Self {
        Self {
            reconciler: ReconcilerConfig::default(),
            retention: RetentionMode::default(),
            recurring_interval_ms: None,
            log_filter: "info".to_string(),
        }
    }
}

impl DatasourceConfig {
    /// Recurring reload period, if configured.
    pub fn recurring_interval(&self) -> Option<Duration> {
        self.recurring_interval_ms.map(Duration::from_millis)
    }
}

impl LodestateConfig for DatasourceConfig {
    fn load_from_file(path: &Path) -> Result<Self> {
        load_config_file(path)
    }

    fn merge_with_env(&mut self) -> Result<()> {
        self.reconciler.merge_with_env()?;
        if let Some(value) = env_override("RETENTION") {
            self.retention = value.parse()?;
        }
        if let Some(value) = env_override("RECURRING_INTERVAL_MS") {
            self.recurring_interval_ms = Some(value.parse().map_err(|_| {
                LodestateError::invalid("Invalid interval in LODESTATE_RECURRING_INTERVAL_MS")
            })?);
        }
        if let Some(value) = env_override("LOG_FILTER") {
            self.log_filter = value;
        }
        Ok(())
    }

    fn merge_with(&mut self, other: &Self) -> Result<()> {
        let defaults = Self::default();
        self.reconciler.merge_with(&other.reconciler)?;
        if other.retention != defaults.retention {
            self.retention = other.retention;
        }
        if other.recurring_interval_ms.is_some() {
            self.recurring_interval_ms = other.recurring_interval_ms;
        }
        if other.log_filter != defaults.log_filter {
            self.log_filter = other.log_filter.clone();
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.reconciler.validate()?;
        if self.recurring_interval_ms == Some(0) {
            return Err(LodestateError::invalid("Recurring interval cannot be 0"));
        }
        if self.log_filter.is_empty() {
            return Err(LodestateError::invalid("Log filter cannot be empty"));
        }
        tracing_subscriber::EnvFilter::try_new(&self.log_filter)
            .map_err(|e| LodestateError::invalid(format!("Invalid log filter: {e}")))?;
        Ok(())
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(reconciler_key) = key.strip_prefix("reconciler.") {
            return self.reconciler.set_from_string(reconciler_key, value);
        }
        match key {
            "retention" => self.retention = value.parse()?,
            "recurring-interval-ms" | "recurring_interval_ms" => {
                self.recurring_interval_ms = match value {
                    "" | "none" => None,
                    millis => Some(
                        millis
                            .parse()
                            .map_err(|_| LodestateError::invalid("Invalid interval value"))?,
                    ),
                };
            }
            "log-filter" | "log_filter" => self.log_filter = value.to_string(),
            _ => {
                return Err(LodestateError::invalid(format!(
                    "Unknown configuration key: {key}"
                )))
            }
        }
        Ok(())
    }
}
