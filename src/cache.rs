//! Cache Module
//!
//! The central cache object: owns a backend built from the registry and
//! exposes the full store contract plus the memoization surface defined
//! in the memo module.

use std::collections::HashMap;

use tracing::info;

use crate::backend::{BackendRegistry, CacheBackend};
use crate::config::CacheConfig;
use crate::error::Result;

// == Cache ==
/// The central caching object.
///
/// Construction resolves the configured backend type through the supplied
/// registry; every store operation is proxied to the backend.
pub struct Cache {
    /// The configured backend
    backend: Box<dyn CacheBackend>,
    /// Cache configuration settings
    config: CacheConfig,
}

impl Cache {
    // == Constructor ==
    /// Creates a new Cache from configuration and a backend registry.
    ///
    /// # Errors
    /// Fails fast on configuration problems: an unknown backend type or a
    /// backend whose own construction fails (for example an unusable
    /// cache directory).
    pub fn new(config: CacheConfig, registry: &BackendRegistry) -> Result<Self> {
        let backend = registry.build(&config.backend, &config)?;
        info!(
            backend = %config.backend,
            default_timeout = config.default_timeout,
            threshold = config.threshold,
            "Cache initialized"
        );
        Ok(Self { backend, config })
    }

    /// Returns the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &dyn CacheBackend {
        self.backend.as_ref()
    }

    // == Store Operations ==
    /// Returns the value for the given key, if it holds a live record.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.backend.get(key)
    }

    /// Stores the given key and value, overwriting unconditionally.
    pub fn set(&self, key: &str, value: &[u8], timeout: Option<u64>) -> bool {
        self.backend.set(key, value, timeout)
    }

    /// Adds a key and value, but only if no live record holds the key.
    pub fn add(&self, key: &str, value: &[u8], timeout: Option<u64>) -> bool {
        self.backend.add(key, value, timeout)
    }

    /// Deletes the record for the given key.
    pub fn delete(&self, key: &str) -> bool {
        self.backend.delete(key)
    }

    /// Determines whether the given key holds a live record.
    pub fn has(&self, key: &str) -> bool {
        self.backend.has(key)
    }

    /// Removes every record from the backend.
    pub fn clear(&self) -> bool {
        self.backend.clear()
    }

    /// Returns the values matching the list of keys, in key order.
    pub fn get_many(&self, keys: &[&str]) -> Vec<Option<Vec<u8>>> {
        self.backend.get_many(keys)
    }

    /// Returns the requested keys and their values as a map.
    pub fn get_dict(&self, keys: &[&str]) -> HashMap<String, Option<Vec<u8>>> {
        self.backend.get_dict(keys)
    }

    /// Stores multiple records with a shared timeout.
    pub fn set_many(&self, mapping: &[(String, Vec<u8>)], timeout: Option<u64>) -> bool {
        self.backend.set_many(mapping, timeout)
    }

    /// Deletes all records matching the list of keys.
    pub fn delete_many(&self, keys: &[&str]) -> bool {
        self.backend.delete_many(keys)
    }

    /// Increments a numerical record and returns the new value.
    pub fn increment(&self, key: &str, delta: i64) -> Option<i64> {
        self.backend.increment(key, delta)
    }

    /// Decrements a numerical record and returns the new value.
    pub fn decrement(&self, key: &str, delta: i64) -> Option<i64> {
        self.backend.decrement(key, delta)
    }
}
