//! Pacing configuration for the trial engine.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    DEFAULT_BATCH_MAX_TRIALS, DEFAULT_CLOCK_CHECK_INTERVAL, DEFAULT_SLICE_MS, MAX_SLICE_MS,
};

/// Errors raised when engine configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },
}

/// How trials are batched and how long a batch may hold the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_batch_max_trials")]
    pub batch_max_trials: u64,
    #[serde(default = "EngineConfig::default_slice_ms")]
    pub slice_ms: u64,
    /// Trials between clock reads inside a batch.
    #[serde(default = "EngineConfig::default_clock_check_interval")]
    pub clock_check_interval: u64,
}

impl EngineConfig {
    #[must_use]
    pub const fn default_batch_max_trials() -> u64 {
        DEFAULT_BATCH_MAX_TRIALS
    }

    #[must_use]
    pub const fn default_slice_ms() -> u64 {
        DEFAULT_SLICE_MS
    }

    #[must_use]
    pub const fn default_clock_check_interval() -> u64 {
        DEFAULT_CLOCK_CHECK_INTERVAL
    }

    #[must_use]
    pub const fn slice(&self) -> Duration {
        Duration::from_millis(self.slice_ms)
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_max_trials == 0 {
            return Err(ConfigError::MinViolation {
                field: "batch_max_trials",
                min: 1,
                value: self.batch_max_trials,
            });
        }
        if !(1..=MAX_SLICE_MS).contains(&self.slice_ms) {
            return Err(ConfigError::RangeViolation {
                field: "slice_ms",
                min: 1,
                max: MAX_SLICE_MS,
                value: self.slice_ms,
            });
        }
        if self.clock_check_interval == 0 {
            return Err(ConfigError::MinViolation {
                field: "clock_check_interval",
                min: 1,
                value: self.clock_check_interval,
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_max_trials: Self::default_batch_max_trials(),
            slice_ms: Self::default_slice_ms(),
            clock_check_interval: Self::default_clock_check_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.slice(), Duration::from_millis(16));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = EngineConfig::from_json(r#"{"slice_ms": 40}"#).unwrap();
        assert_eq!(cfg.slice_ms, 40);
        assert_eq!(cfg.batch_max_trials, DEFAULT_BATCH_MAX_TRIALS);
        assert_eq!(cfg.clock_check_interval, DEFAULT_CLOCK_CHECK_INTERVAL);
    }

    #[test]
    fn rejects_zero_and_oversized_values() {
        let zero_batch = EngineConfig {
            batch_max_trials: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            zero_batch.validate(),
            Err(ConfigError::MinViolation { field: "batch_max_trials", .. })
        ));

        let long_slice = EngineConfig {
            slice_ms: MAX_SLICE_MS + 1,
            ..EngineConfig::default()
        };
        assert!(matches!(
            long_slice.validate(),
            Err(ConfigError::RangeViolation { field: "slice_ms", .. })
        ));

        let zero_interval = EngineConfig {
            clock_check_interval: 0,
            ..EngineConfig::default()
        };
        assert!(zero_interval.validate().is_err());
    }
}
