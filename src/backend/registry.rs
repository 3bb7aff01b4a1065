//! Backend Registry Module
//!
//! Explicit registration table mapping backend type names to factories.
//! The table is built at startup and passed by reference into the cache,
//! rather than living in a process-wide mutable singleton.

use std::collections::HashMap;

use crate::backend::{CacheBackend, FileSystemCache, MemoryCache, NullCache};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Backend Factory ==
/// Constructs a backend from the cache configuration.
pub type BackendFactory = fn(&CacheConfig) -> Result<Box<dyn CacheBackend>>;

// == Backend Registry ==
/// Registration table of backend constructors, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    // == Constructors ==
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in backends registered:
    /// "memory", "filesystem" and "null".
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", build_memory);
        registry.register("filesystem", build_filesystem);
        registry.register("null", build_null);
        registry
    }

    // == Register ==
    /// Registers a factory under a backend type name.
    ///
    /// Registering an existing name replaces its factory, which lets
    /// applications shadow a built-in backend with their own.
    pub fn register(&mut self, name: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(name.into(), factory);
    }

    // == Contains ==
    /// Checks whether a backend type name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    // == Build ==
    /// Constructs the backend registered under `name`.
    ///
    /// # Errors
    /// Returns `CacheError::UnknownBackend` if no factory is registered
    /// under the name, or the factory's own configuration error.
    pub fn build(&self, name: &str, config: &CacheConfig) -> Result<Box<dyn CacheBackend>> {
        match self.factories.get(name) {
            Some(factory) => factory(config),
            None => Err(CacheError::UnknownBackend(name.to_string())),
        }
    }
}

// == Built-in Factories ==
fn build_memory(config: &CacheConfig) -> Result<Box<dyn CacheBackend>> {
    Ok(Box::new(MemoryCache::new(
        config.threshold,
        config.default_timeout,
        config.ignore_errors,
    )))
}

fn build_filesystem(config: &CacheConfig) -> Result<Box<dyn CacheBackend>> {
    let cache_dir = config.cache_dir.as_ref().ok_or_else(|| {
        CacheError::InvalidConfig("filesystem backend requires cache_dir".to_string())
    })?;
    Ok(Box::new(FileSystemCache::new(
        cache_dir,
        config.threshold,
        config.default_timeout,
        config.ignore_errors,
    )?))
}

fn build_null(_config: &CacheConfig) -> Result<Box<dyn CacheBackend>> {
    Ok(Box::new(NullCache::new()))
}
