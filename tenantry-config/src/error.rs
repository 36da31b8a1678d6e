//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot load .env file: {0}")]
    Dotenv(String),

    /// File extension is neither `toml` nor `json`
    #[error("unsupported config file format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    /// Environment variable that does not parse as its option's type
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    /// Option that parsed but breaks a validation rule
    #[error("{field} {reason}")]
    Invalid { field: String, reason: String },

    /// Merged tree does not deserialize into `TenancyConfig`
    #[error("configuration does not match the expected shape: {0}")]
    Malformed(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
