//! Configuration errors.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading or writing a config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Layered loading failed.
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A value is outside the range the harness can run with.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
