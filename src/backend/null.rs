//! Null Backend Module
//!
//! A cache backend that doesn't cache. Useful for unit testing and for
//! disabling caching without touching call sites.

use crate::backend::CacheBackend;

// == Null Cache ==
/// A cache backend that stores nothing and never reports a hit.
#[derive(Debug, Default)]
pub struct NullCache;

impl NullCache {
    /// Creates a new NullCache.
    pub fn new() -> Self {
        Self
    }
}

// == Backend Contract Implementation ==
impl CacheBackend for NullCache {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8], _timeout: Option<u64>) -> bool {
        true
    }

    fn add(&self, _key: &str, _value: &[u8], _timeout: Option<u64>) -> bool {
        true
    }

    fn delete(&self, _key: &str) -> bool {
        true
    }

    fn has(&self, _key: &str) -> bool {
        false
    }

    fn clear(&self) -> bool {
        true
    }
}
