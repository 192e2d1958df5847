//! Error types for cache dispatch.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No backend registered under the default prefix
    #[error("no cache backend configured, call `Cache::setup` before dispatching")]
    NotConfigured,

    /// Invalid backend locator
    #[error("invalid cache locator: {0}")]
    InvalidUrl(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Backend operation failure
    #[error("backend error: {0}")]
    Backend(String),

    /// One or more backends failed during lifecycle fan-out
    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}
