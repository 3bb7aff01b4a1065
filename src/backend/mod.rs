//! Backend Module
//!
//! Defines the polymorphic store contract every cache backend satisfies,
//! plus the concrete backends shipped with this crate and the registry
//! used to construct them by type name.

mod entry;
mod filesystem;
mod memory;
mod null;
mod registry;


// Re-export public types
pub use entry::{current_timestamp_secs, normalize_expiry, CacheEntry};
pub use filesystem::FileSystemCache;
pub use memory::MemoryCache;
pub use null::NullCache;
pub use registry::{BackendFactory, BackendRegistry};

use std::collections::HashMap;

// == Backend Contract ==
/// The store contract implemented by every cache backend.
///
/// All operations may be invoked concurrently by multiple callers, so
/// implementations use interior mutability and take `&self`.
///
/// Per-operation I/O failures are never raised: backends log them and
/// report `false` or `None` instead. Only construction can fail, with a
/// fatal configuration error.
pub trait CacheBackend: Send + Sync {
    /// Looks up a key and returns its value.
    ///
    /// Returns `None` if the key is missing or was lazily found expired,
    /// in which case the expired record is also deleted as a side effect.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores a value under a key, overwriting unconditionally.
    ///
    /// A timeout of `Some(0)` means the record never expires; `None` uses
    /// the backend's configured default timeout.
    ///
    /// # Returns
    /// `true` if the record was written, `false` on backend failure.
    fn set(&self, key: &str, value: &[u8], timeout: Option<u64>) -> bool;

    /// Works like [`CacheBackend::set`] but refuses to overwrite.
    ///
    /// # Returns
    /// `false` and leaves existing data untouched if the key already holds
    /// a live (non-expired) value.
    fn add(&self, key: &str, value: &[u8], timeout: Option<u64>) -> bool;

    /// Deletes a key.
    ///
    /// # Returns
    /// Whether the key existed and has been deleted.
    fn delete(&self, key: &str) -> bool;

    /// Checks whether a key holds a live value, without decoding the value
    /// payload where the backend can cheaply avoid it.
    fn has(&self, key: &str) -> bool;

    /// Removes every record from the backend.
    fn clear(&self) -> bool;

    /// Whether batch deletions continue past individual failures.
    fn ignore_errors(&self) -> bool {
        false
    }

    /// Returns the values for the given keys, in key order.
    ///
    /// Defined strictly as a sequential composition of [`CacheBackend::get`].
    fn get_many(&self, keys: &[&str]) -> Vec<Option<Vec<u8>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Like [`CacheBackend::get_many`] but returns a key -> value map.
    fn get_dict(&self, keys: &[&str]) -> HashMap<String, Option<Vec<u8>>> {
        keys.iter()
            .map(|key| (key.to_string(), self.get(key)))
            .collect()
    }

    /// Stores multiple key/value pairs with a shared timeout.
    ///
    /// # Returns
    /// Whether all pairs were written.
    fn set_many(&self, mapping: &[(String, Vec<u8>)], timeout: Option<u64>) -> bool {
        let mut all_set = true;
        for (key, value) in mapping {
            if !self.set(key, value, timeout) {
                all_set = false;
            }
        }
        all_set
    }

    /// Deletes multiple keys at once.
    ///
    /// Short-circuits on the first failed deletion unless the backend is
    /// configured to ignore errors, in which case it best-efforts through
    /// every key and reports the aggregate outcome.
    fn delete_many(&self, keys: &[&str]) -> bool {
        if self.ignore_errors() {
            let mut all_deleted = true;
            for key in keys {
                if !self.delete(key) {
                    all_deleted = false;
                }
            }
            all_deleted
        } else {
            for key in keys {
                if !self.delete(key) {
                    return false;
                }
            }
            true
        }
    }

    /// Increments a numeric record by `delta`, initializing a missing
    /// record to `delta`.
    ///
    /// The default is a read-then-write over [`CacheBackend::get`] and
    /// [`CacheBackend::set`] and is not atomic under concurrent writers.
    /// Backends with native atomic counters override this.
    ///
    /// # Returns
    /// The new value, or `None` on backend failure.
    fn increment(&self, key: &str, delta: i64) -> Option<i64> {
        let current = self.get(key).and_then(|bytes| parse_counter(&bytes)).unwrap_or(0);
        let value = current + delta;
        if self.set(key, value.to_string().as_bytes(), None) {
            Some(value)
        } else {
            None
        }
    }

    /// Decrements a numeric record by `delta`.
    ///
    /// Same non-atomicity caveat as [`CacheBackend::increment`].
    fn decrement(&self, key: &str, delta: i64) -> Option<i64> {
        self.increment(key, -delta)
    }
}

// == Counter Parsing ==
/// Parses a counter record stored as decimal integer bytes.
pub(crate) fn parse_counter(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}
