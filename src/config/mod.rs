//! Layered configuration.
//!
//! Precedence (highest to lowest):
//! - Environment variables (`ORDINAL_*`)
//! - Config file named by `ORDINAL_CONFIG`
//! - `./ordinal.toml`
//! - Built-in defaults
//!
//! Every value is validated after all layers are applied.

pub mod clock;
pub mod error;
pub mod session;

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;

pub use clock::ClockSettings;
pub use error::ConfigError;
pub use session::SessionSettings;

use self::error::ParseFileSnafu;
use self::error::ReadFileSnafu;
use self::error::SerializeSnafu;
use self::error::WriteFileSnafu;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ORDINAL_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG_FILE: &str = "./ordinal.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdinalConfig {
    pub session: SessionSettings,
    pub clock: ClockSettings,
}

impl OrdinalConfig {
    /// Defaults, then a config file if one is found, then environment
    /// overrides; validated.
    pub fn load_with_layers() -> Result<Self, ConfigError> {
        let mut config = Self::load_toml_with_fallbacks()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn load_toml_with_fallbacks() -> Result<Self, ConfigError> {
        if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
            tracing::info!(path = %config_path, "loading configuration from ORDINAL_CONFIG");
            return Self::from_toml_file(config_path);
        }

        let local = Path::new(LOCAL_CONFIG_FILE);
        if local.exists() {
            tracing::info!(path = LOCAL_CONFIG_FILE, "loading configuration");
            return Self::from_toml_file(local);
        }

        tracing::info!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a TOML file. Missing tables and keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        toml::from_str(&contents).context(ParseFileSnafu { path })
    }

    /// Write the configuration out as TOML.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).context(SerializeSnafu)?;
        std::fs::write(path, contents).context(WriteFileSnafu { path })
    }

    /// Apply `ORDINAL_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(&|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        self.session.apply_overrides(lookup)?;
        self.clock.apply_overrides(lookup)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        self.clock.validate()?;
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = OrdinalConfig::default();
        assert_eq!(config.session.default_servers, "localhost:2181");
        assert_eq!(config.session.session_timeout_ms, 10_000);
        assert_eq!(config.session.connection_timeout_ms, 10_000);
        assert_eq!(config.clock.retry_count, 10);
        assert_eq!(config.clock.retry_delay_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[clock]\nretry_count = 3\n\n[session]\ndefault_servers = \"zk1:2181,zk2:2181\"").unwrap();

        let config = OrdinalConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.clock.retry_count, 3);
        assert_eq!(config.clock.retry_delay_ms, 100);
        assert_eq!(config.session.default_servers, "zk1:2181,zk2:2181");
        assert_eq!(config.session.connection_timeout_ms, 10_000);
    }

    #[test]
    fn unreadable_and_malformed_files_are_errors() {
        assert!(matches!(
            OrdinalConfig::from_toml_file("/nonexistent/ordinal.toml"),
            Err(ConfigError::ReadFile { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[clock]\nretry_count = \"many\"").unwrap();
        assert!(matches!(OrdinalConfig::from_toml_file(file.path()), Err(ConfigError::ParseFile { .. })));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut config = OrdinalConfig::default();
        config.clock.retry_count = 3;
        config
            .apply_overrides(&env(&[
                ("ORDINAL_RETRY_COUNT", "7"),
                ("ORDINAL_RETRY_DELAY_MS", "25"),
                ("ORDINAL_SERVERS_FILE", "/etc/ordinal/servers"),
                ("ORDINAL_CONNECTION_TIMEOUT_MS", " 500 "),
            ]))
            .unwrap();

        assert_eq!(config.clock.retry_count, 7);
        assert_eq!(config.clock.retry_delay_ms, 25);
        assert_eq!(config.session.connection_timeout_ms, 500);
        assert_eq!(config.session.servers_file.as_deref(), Some(Path::new("/etc/ordinal/servers")));
    }

    #[test]
    fn malformed_override_names_the_variable() {
        let mut config = OrdinalConfig::default();
        let err = config.apply_overrides(&env(&[("ORDINAL_SESSION_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ORDINAL_SESSION_TIMEOUT_MS"));
    }

    #[test]
    fn validation_rejects_zero_values() {
        let mut config = OrdinalConfig::default();
        config.session.connection_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = OrdinalConfig::default();
        config.clock.retry_count = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("clock.retry_count"));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ordinal.toml");
        let mut config = OrdinalConfig::default();
        config.session.servers_file = Some(dir.path().join("servers"));
        config.clock.retry_delay_ms = 5;

        config.save_to_file(&path).unwrap();
        assert_eq!(OrdinalConfig::from_toml_file(&path).unwrap(), config);
    }

    #[test]
    fn settings_convert_for_the_recipes() {
        let config = OrdinalConfig::default();
        let session = config.session.to_session_config();
        assert_eq!(session.connection_timeout, Duration::from_secs(10));
        assert_eq!(config.clock.retry_policy().attempts(), 10);
        assert_eq!(config.clock.retry_policy().base_delay(), Duration::from_millis(100));
    }
}
