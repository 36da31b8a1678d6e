//! Cache errors

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Value could not be encoded for storage
    #[error("cannot encode cached value for '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },

    /// Stored value does not decode as the requested type
    #[error("cannot decode cached value for '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    /// Backend could not be reached
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}
