//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.
//!
//! Only two kinds of failures surface as errors: fatal configuration
//! problems at construction time, and usage errors that indicate a
//! programming mistake. Per-operation backend I/O failures are swallowed
//! by the backends and reported as `false`/`None` return values instead.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No factory is registered for the requested backend type
    #[error("Unknown cache backend type: {0}")]
    UnknownBackend(String),

    /// The filesystem backend could not use its cache directory
    #[error("Invalid cache directory '{path}': {source}")]
    InvalidCacheDir {
        /// The offending directory
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// The backend requires configuration that was not provided
    #[error("Invalid backend configuration: {0}")]
    InvalidConfig(String),

    /// The caller misused the memoization surface
    #[error("Usage error: {0}")]
    Usage(String),

    /// A cached payload could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
