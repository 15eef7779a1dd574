//! Session settings

use std::path::PathBuf;
use std::time::Duration;

use ordinal_constants::session::DEFAULT_CONNECTION_TIMEOUT_MS;
use ordinal_constants::session::DEFAULT_ENSEMBLE;
use ordinal_constants::session::DEFAULT_SESSION_TIMEOUT_MS;
use ordinal_coordination::SessionConfig;
use serde::Deserialize;
use serde::Serialize;

use super::error::ConfigError;
use super::parse_env;

/// `[session]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// File whose first line is the ensemble list. Overrides `default_servers`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers_file: Option<PathBuf>,
    /// Ensemble list used when no file is configured.
    pub default_servers: String,
    pub session_timeout_ms: u64,
    pub connection_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            servers_file: None,
            default_servers: DEFAULT_ENSEMBLE.to_string(),
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }
}

impl SessionSettings {
    pub(super) fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("ORDINAL_SERVERS_FILE") {
            self.servers_file = Some(val.into());
        }
        if let Some(val) = lookup("ORDINAL_SESSION_TIMEOUT_MS") {
            self.session_timeout_ms = parse_env("ORDINAL_SESSION_TIMEOUT_MS", &val)?;
        }
        if let Some(val) = lookup("ORDINAL_CONNECTION_TIMEOUT_MS") {
            self.connection_timeout_ms = parse_env("ORDINAL_CONNECTION_TIMEOUT_MS", &val)?;
        }
        Ok(())
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.session_timeout_ms == 0 {
            return Err(zero("session.session_timeout_ms"));
        }
        if self.connection_timeout_ms == 0 {
            return Err(zero("session.connection_timeout_ms"));
        }
        if self.servers_file.is_none() && self.default_servers.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "session.default_servers".to_string(),
                value: self.default_servers.clone(),
                reason: "must name at least one server when no servers_file is set".to_string(),
            });
        }
        Ok(())
    }

    /// Settings in the form the session manager takes.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            servers_file: self.servers_file.clone(),
            default_servers: self.default_servers.clone(),
            session_timeout: Duration::from_millis(self.session_timeout_ms),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
        }
    }
}

fn zero(key: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: "0".to_string(),
        reason: "must be greater than zero".to_string(),
    }
}
