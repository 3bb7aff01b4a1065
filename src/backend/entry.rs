//! Cache Entry Module
//!
//! Defines the structure for individual cache records with expiry support.

// == Cache Entry ==
/// Represents a single cache record with value and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value bytes
    pub value: Vec<u8>,
    /// Expiration timestamp (Unix seconds), 0 = never expires
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry from raw value bytes and a normalized
    /// expiration timestamp.
    ///
    /// # Arguments
    /// * `value` - The value bytes to store
    /// * `expires_at` - Absolute expiry in Unix seconds, 0 for never
    pub fn new(value: Vec<u8>, expires_at: u64) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is considered expired when the current
    /// time is greater than or equal to the expiration time, so once the
    /// timeout has fully elapsed the entry is immediately expired.
    ///
    /// # Returns
    /// - `true` if the entry has an expiry and the current time >= expiration time
    /// - `false` if the entry never expires or the timeout hasn't elapsed
    pub fn is_expired(&self) -> bool {
        self.expires_at != 0 && current_timestamp_secs() >= self.expires_at
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in seconds.
pub fn current_timestamp_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Normalizes a relative timeout into an absolute expiration timestamp.
///
/// A timeout of `None` falls back to the backend's configured default.
/// A timeout of 0 means the record never expires and maps to expiry 0.
///
/// # Arguments
/// * `timeout` - Relative timeout in seconds, if supplied by the caller
/// * `default_timeout` - The backend's configured default timeout in seconds
pub fn normalize_expiry(timeout: Option<u64>, default_timeout: u64) -> u64 {
    let timeout = timeout.unwrap_or(default_timeout);
    if timeout == 0 {
        0
    } else {
        current_timestamp_secs() + timeout
    }
}
