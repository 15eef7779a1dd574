//! Sequence clock settings

use std::time::Duration;

use ordinal_constants::clock::DEFAULT_RETRY_COUNT;
use ordinal_constants::clock::DEFAULT_RETRY_DELAY_MS;
use ordinal_coordination::RetryPolicy;
use serde::Deserialize;
use serde::Serialize;

use super::error::ConfigError;
use super::parse_env;

/// `[clock]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Attempts per call before giving up on retryable store errors.
    pub retry_count: u32,
    /// Base of the linear backoff after a connection loss.
    pub retry_delay_ms: u64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl ClockSettings {
    pub(super) fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("ORDINAL_RETRY_COUNT") {
            self.retry_count = parse_env("ORDINAL_RETRY_COUNT", &val)?;
        }
        if let Some(val) = lookup("ORDINAL_RETRY_DELAY_MS") {
            self.retry_delay_ms = parse_env("ORDINAL_RETRY_DELAY_MS", &val)?;
        }
        Ok(())
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "clock.retry_count".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, Duration::from_millis(self.retry_delay_ms))
    }
}
