//! Filesystem Backend Module
//!
//! Cache backend storing one file per record in a dedicated directory.
//! The backend depends on being the only user of that directory: anything
//! else writing files there will eventually be deleted by pruning.
//!
//! Record layout: an 8-byte big-endian expiration timestamp (0 = never)
//! followed by the raw value bytes, so existence checks only read the
//! header. A reserved management record holds the current record count,
//! letting the backend answer "how many items" without a directory scan.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::backend::{current_timestamp_secs, normalize_expiry, parse_counter, CacheBackend};
use crate::error::{CacheError, Result};

// == Constants ==
/// Reserved key of the management record holding the record count.
const COUNT_KEY: &str = "__memocache_count";

/// Suffix of in-flight temporary files, excluded from directory listings.
const TMP_SUFFIX: &str = ".__memocache_tmp";

/// Length of the expiry header at the start of every record file.
const HEADER_LEN: usize = 8;

// == Filesystem Cache ==
/// Cache backend that stores records on the local filesystem.
#[derive(Debug)]
pub struct FileSystemCache {
    /// Directory holding the record files
    path: PathBuf,
    /// Maximum number of records before pruning (0 = unbounded, uncounted)
    threshold: usize,
    /// Default timeout in seconds for records without explicit timeout
    default_timeout: u64,
    /// Whether batch deletions continue past individual failures
    ignore_errors: bool,
}

impl FileSystemCache {
    // == Constructor ==
    /// Creates a new FileSystemCache rooted at `cache_dir`.
    ///
    /// The directory is created if missing, and the management count is
    /// initialized from a directory scan.
    ///
    /// # Errors
    /// Returns a fatal configuration error if the directory cannot be
    /// created.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        threshold: usize,
        default_timeout: u64,
        ignore_errors: bool,
    ) -> Result<Self> {
        let path = cache_dir.into();
        fs::create_dir_all(&path).map_err(|source| CacheError::InvalidCacheDir {
            path: path.clone(),
            source,
        })?;

        let cache = Self {
            path,
            threshold,
            default_timeout,
            ignore_errors,
        };
        cache.recount();
        Ok(cache)
    }

    // == Record Count ==
    /// Returns the record count as maintained by the management record.
    ///
    /// This is an O(1) read that can drift slightly under concurrent
    /// writers; pruning and [`FileSystemCache::recount`] restore it to an
    /// exact value.
    pub fn count(&self) -> usize {
        self.read_record(&self.filename(COUNT_KEY))
            .and_then(|(_, value)| parse_counter(&value))
            .map(|count| count.max(0) as usize)
            .unwrap_or(0)
    }

    /// Recomputes the record count from a directory scan and persists it.
    ///
    /// This is the repair path for a management count left inexact by a
    /// crash between a record write and its count update.
    pub fn recount(&self) -> usize {
        let count = self.list_dir().len();
        self.set_count(count);
        count
    }

    fn set_count(&self, value: usize) {
        // With no threshold there is nothing to bound, so don't count
        if self.threshold == 0 {
            return;
        }
        self.write_record(&self.filename(COUNT_KEY), 0, value.to_string().as_bytes());
    }

    fn update_count(&self, delta: i64) {
        if self.threshold == 0 {
            return;
        }
        let count = (self.count() as i64 + delta).max(0) as usize;
        self.set_count(count);
    }

    // == File Helpers ==
    /// Maps a key to its record file path via a hex digest of the key.
    fn filename(&self, key: &str) -> PathBuf {
        self.path.join(format!("{:x}", md5::compute(key.as_bytes())))
    }

    /// Lists record files, excluding temp files and the management record.
    fn list_dir(&self) -> Vec<PathBuf> {
        let count_name = self.filename(COUNT_KEY);
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to list cache directory {:?}: {}", self.path, err);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                !name.ends_with(TMP_SUFFIX) && *path != count_name
            })
            .collect()
    }

    /// Reads just the expiry header of a record file.
    fn read_expiry(&self, path: &Path) -> Option<u64> {
        let mut file = fs::File::open(path).ok()?;
        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header).ok()?;
        Some(u64::from_be_bytes(header))
    }

    /// Reads a whole record file as (expiry, value bytes).
    fn read_record(&self, path: &Path) -> Option<(u64, Vec<u8>)> {
        let bytes = fs::read(path).ok()?;
        if bytes.len() < HEADER_LEN {
            debug!("Truncated cache record at {:?}", path);
            return None;
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);
        Some((u64::from_be_bytes(header), bytes[HEADER_LEN..].to_vec()))
    }

    /// Writes a record file atomically via a temp file and rename.
    fn write_record(&self, path: &Path, expires_at: u64, value: &[u8]) -> bool {
        let result = tempfile::Builder::new()
            .suffix(TMP_SUFFIX)
            .tempfile_in(&self.path)
            .and_then(|mut tmp| {
                use std::io::Write;
                tmp.write_all(&expires_at.to_be_bytes())?;
                tmp.write_all(value)?;
                tmp.persist(path).map_err(|e| e.error)?;
                Ok(())
            });

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to write cache record at {:?}: {}", path, err);
                false
            }
        }
    }

    /// Removes a record file and adjusts the count on success.
    fn remove_record(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => {
                self.update_count(-1);
                true
            }
            Err(_) => false,
        }
    }

    // == Prune ==
    /// Removes record files when the count has grown past the threshold.
    ///
    /// Scans the listing once, removing expired records plus every third
    /// record so the pass makes forward progress even when nothing has
    /// expired, then resets the count to an exact value.
    fn prune(&self) {
        if self.threshold == 0 || self.count() <= self.threshold {
            return;
        }

        let now = current_timestamp_secs();
        for (idx, path) in self.list_dir().into_iter().enumerate() {
            let expired = match self.read_expiry(&path) {
                Some(expires_at) => expires_at != 0 && expires_at <= now,
                None => continue,
            };
            if expired || idx % 3 == 0 {
                if let Err(err) = fs::remove_file(&path) {
                    debug!("Failed to prune cache record at {:?}: {}", path, err);
                }
            }
        }

        self.set_count(self.list_dir().len());
    }
}

// == Backend Contract Implementation ==
impl CacheBackend for FileSystemCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.filename(key);
        let (expires_at, value) = self.read_record(&path)?;
        if expires_at == 0 || expires_at > current_timestamp_secs() {
            Some(value)
        } else {
            // Lazy expiry: reading an expired record deletes it
            self.remove_record(&path);
            None
        }
    }

    fn set(&self, key: &str, value: &[u8], timeout: Option<u64>) -> bool {
        self.prune();

        let expires_at = normalize_expiry(timeout, self.default_timeout);
        let path = self.filename(key);
        let existed = path.exists();
        if !self.write_record(&path, expires_at, value) {
            return false;
        }
        if !existed {
            self.update_count(1);
        }
        true
    }

    fn add(&self, key: &str, value: &[u8], timeout: Option<u64>) -> bool {
        let path = self.filename(key);
        if let Some(expires_at) = self.read_expiry(&path) {
            if expires_at == 0 || expires_at > current_timestamp_secs() {
                return false;
            }
        }
        self.set(key, value, timeout)
    }

    fn delete(&self, key: &str) -> bool {
        self.remove_record(&self.filename(key))
    }

    fn has(&self, key: &str) -> bool {
        let path = self.filename(key);
        match self.read_expiry(&path) {
            Some(expires_at) if expires_at == 0 || expires_at > current_timestamp_secs() => true,
            Some(_) => {
                self.remove_record(&path);
                false
            }
            None => false,
        }
    }

    fn clear(&self) -> bool {
        for path in self.list_dir() {
            if let Err(err) = fs::remove_file(&path) {
                warn!("Failed to clear cache record at {:?}: {}", path, err);
                self.set_count(self.list_dir().len());
                return false;
            }
        }
        self.set_count(0);
        true
    }

    fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }
}
