//! Cache error types. These never escape the `CacheService`.

use thiserror::Error;

/// Errors raised by cache tiers and payload codecs.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The shared backend could not be reached or rejected the operation.
    #[error("shared cache backend unavailable: {0}")]
    Unavailable(String),

    /// A value could not be serialized for the shared tier.
    #[error("failed to encode cache value: {0}")]
    Encode(String),

    /// A shared-tier payload could not be deserialized.
    #[error("failed to decode cache value: {0}")]
    Decode(String),

    /// Region configuration could not be parsed.
    #[error("invalid cache region configuration: {0}")]
    Config(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}
