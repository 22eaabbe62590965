//! Error types for the response cache
//!
//! Provides unified error handling using thiserror. Only storage
//! implementations and the CLI ever surface these; the cache layers
//! recover from every variant locally.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the response cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The persistent backend is not provided by the host environment
    #[error("Storage unavailable")]
    StorageUnavailable,

    /// A stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend refused a write because it is full
    #[error("Storage quota exceeded: {requested} bytes requested, limit is {limit} bytes")]
    QuotaExceeded { requested: usize, limit: usize },

    /// The backend failed to read or write its medium
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the response cache.
pub type Result<T> = std::result::Result<T, CacheError>;
