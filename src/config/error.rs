//! Configuration error types.

use std::path::PathBuf;

use snafu::Snafu;

/// Failures loading or validating [`super::OrdinalConfig`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[snafu(display("failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[snafu(display("failed to parse configuration file {}: {source}", path.display()))]
    ParseFile {
        /// File that was parsed.
        path: PathBuf,
        /// Parser diagnostic.
        source: toml::de::Error,
    },

    /// The configuration could not be rendered as TOML.
    #[snafu(display("failed to serialize configuration: {source}"))]
    Serialize {
        /// Serializer diagnostic.
        source: toml::ser::Error,
    },

    /// The configuration could not be written out.
    #[snafu(display("failed to write configuration file {}: {source}", path.display()))]
    WriteFile {
        /// Destination file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A value is present but unusable.
    #[snafu(display("invalid configuration for {key}: '{value}' ({reason})"))]
    InvalidValue {
        /// Setting name, as a TOML path or environment variable.
        key: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
