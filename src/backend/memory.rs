//! Memory Backend Module
//!
//! In-process cache backend enforcing a maximum record count via
//! opportunistic pruning.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::backend::{current_timestamp_secs, normalize_expiry, CacheBackend, CacheEntry};

// == Memory Cache ==
/// In-memory cache backend with threshold-based pruning.
///
/// The threshold bounds the record count approximately, not exactly:
/// concurrent writers may both observe the count below the threshold and
/// both insert, transiently exceeding it until the next pruning pass.
#[derive(Debug)]
pub struct MemoryCache {
    /// Key-value storage
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Maximum number of records before pruning (0 = unbounded)
    threshold: usize,
    /// Default timeout in seconds for records without explicit timeout
    default_timeout: u64,
    /// Whether batch deletions continue past individual failures
    ignore_errors: bool,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates a new MemoryCache.
    ///
    /// # Arguments
    /// * `threshold` - Maximum records held before pruning starts (0 = unbounded)
    /// * `default_timeout` - Default timeout in seconds (0 = never expires)
    /// * `ignore_errors` - Best-effort batch deletions
    pub fn new(threshold: usize, default_timeout: u64, ignore_errors: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            threshold,
            default_timeout,
            ignore_errors,
        }
    }

    // == Length ==
    /// Returns the current number of records.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // == Prune ==
    /// Removes records when the store has grown past its threshold.
    ///
    /// Scans all records once and removes those that have expired, plus
    /// every third record regardless of expiry so the pass makes forward
    /// progress even when nothing carries an expiry. Survivor choice is
    /// not specified; callers rely only on the resulting bound.
    ///
    /// Runs with the write lock already held, before an insert.
    fn prune_locked(&self, entries: &mut HashMap<String, CacheEntry>) {
        if self.threshold == 0 || entries.len() <= self.threshold {
            return;
        }

        let now = current_timestamp_secs();
        let to_remove: Vec<String> = entries
            .iter()
            .enumerate()
            .filter(|(idx, (_, entry))| {
                (entry.expires_at != 0 && entry.expires_at <= now) || idx % 3 == 0
            })
            .map(|(_, (key, _))| key.clone())
            .collect();

        for key in to_remove {
            entries.remove(&key);
        }
    }
}

// == Backend Contract Implementation ==
impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        // Lazy expiry: reading an expired record deletes it
        entries.remove(key);
        None
    }

    fn set(&self, key: &str, value: &[u8], timeout: Option<u64>) -> bool {
        let expires_at = normalize_expiry(timeout, self.default_timeout);
        let mut entries = self.entries.write();
        self.prune_locked(&mut entries);
        entries.insert(key.to_string(), CacheEntry::new(value.to_vec(), expires_at));
        true
    }

    fn add(&self, key: &str, value: &[u8], timeout: Option<u64>) -> bool {
        let expires_at = normalize_expiry(timeout, self.default_timeout);
        let mut entries = self.entries.write();
        self.prune_locked(&mut entries);
        if let Some(existing) = entries.get(key) {
            if !existing.is_expired() {
                return false;
            }
        }
        entries.insert(key.to_string(), CacheEntry::new(value.to_vec(), expires_at));
        true
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn has(&self, key: &str) -> bool {
        match self.entries.read().get(key) {
            Some(entry) => !entry.is_expired(),
            None => false,
        }
    }

    fn clear(&self) -> bool {
        self.entries.write().clear();
        true
    }

    fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }
}
