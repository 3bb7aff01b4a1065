//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backend type name to look up in the registry ("memory", "filesystem", "null", ...)
    pub backend: String,
    /// Default timeout in seconds for records stored without an explicit timeout
    pub default_timeout: u64,
    /// Maximum number of records a bounded backend holds before pruning (0 = unbounded)
    pub threshold: usize,
    /// Directory used by the filesystem backend
    pub cache_dir: Option<PathBuf>,
    /// Whether batch deletions continue past individual failures
    pub ignore_errors: bool,
    /// Whether memoization raises decode failures instead of recomputing
    pub strict: bool,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMOCACHE_BACKEND` - Backend type name (default: "null")
    /// - `MEMOCACHE_DEFAULT_TIMEOUT` - Default timeout in seconds (default: 300)
    /// - `MEMOCACHE_THRESHOLD` - Bounded backend record threshold (default: 500)
    /// - `MEMOCACHE_CACHE_DIR` - Filesystem backend directory (default: unset)
    /// - `MEMOCACHE_IGNORE_ERRORS` - Best-effort batch deletions (default: false)
    /// - `MEMOCACHE_STRICT` - Raise decode failures in memoization (default: false)
    pub fn from_env() -> Self {
        Self {
            backend: env::var("MEMOCACHE_BACKEND").unwrap_or_else(|_| "null".to_string()),
            default_timeout: env::var("MEMOCACHE_DEFAULT_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            threshold: env::var("MEMOCACHE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            cache_dir: env::var("MEMOCACHE_CACHE_DIR").ok().map(PathBuf::from),
            ignore_errors: env::var("MEMOCACHE_IGNORE_ERRORS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            strict: env::var("MEMOCACHE_STRICT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Returns a config using the given backend type and defaults for the rest.
    pub fn with_backend(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "null".to_string(),
            default_timeout: 300,
            threshold: 500,
            cache_dir: None,
            ignore_errors: false,
            strict: false,
        }
    }
}
