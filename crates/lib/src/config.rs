//! Engine configuration.
//!
//! ```
//! use orderly::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "debounce_ms": 800 }"#).unwrap();
//! assert_eq!(config.debounce_ms, 800);
//! assert_eq!(config.optimistic_id_prefix, "optimistic");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Result;
use crate::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_OPTIMISTIC_PREFIX};

/// Tunables of a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before a debounced edit is written, in milliseconds
    pub debounce_ms: u64,
    /// Prefix of locally generated ids for unconfirmed creates
    pub optimistic_id_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            optimistic_id_prefix: DEFAULT_OPTIMISTIC_PREFIX.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "debounce_ms",
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        if self.optimistic_id_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "optimistic_id_prefix",
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// The debounce period as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Invalid configuration values.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Config(err)
    }
}
