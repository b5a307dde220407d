//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Blank or oversized key, unsupported region, or a null value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation the storage model cannot support
    #[error("Operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    /// Storage collaborator I/O failure, passed through unchanged
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Value could not be encoded or a stored record could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CacheError::InvalidArgument(msg.into())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
