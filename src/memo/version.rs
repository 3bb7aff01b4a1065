//! Version Token Module
//!
//! Maintains the per-namespace version tokens incorporated into every
//! memoized cache key. Bumping a token invalidates every previously
//! cached result for that scope without enumerating keys.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::cache::Cache;

// == Constants ==
/// Number of characters kept from the encoded random token.
const TOKEN_LEN: usize = 6;

// == Version Key ==
/// Derives the store key holding a namespace's version token.
pub(crate) fn version_key(namespace: &str) -> String {
    format!("{}_memver", namespace)
}

// == Token Generation ==
/// Generates a fresh random version token.
fn make_version_token() -> String {
    let bytes: [u8; 16] = rand::random();
    let mut token = BASE64.encode(bytes);
    token.truncate(TOKEN_LEN);
    token
}

// == Version Options ==
/// Controls one pass over a function's version tokens.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct VersionOptions {
    /// Replace the most specific scope's token with a fresh one
    pub reset: bool,
    /// Delete the most specific scope's version key outright
    pub delete: bool,
    /// Force persisting the tokens even without a value change, so their
    /// timeout is refreshed
    pub forced_dirty: bool,
    /// Timeout applied when tokens are persisted
    pub timeout: Option<u64>,
}

// == Version Protocol ==
/// Fetches, lazily creates and maybe rewrites the version tokens for a
/// function namespace and its optional instance namespace.
///
/// Both version keys are fetched in one batch read. Absent tokens are
/// generated and persisted with the configured timeout. `reset` replaces
/// only the most specific scope's token; `delete` removes only the most
/// specific scope's key and returns nothing.
///
/// # Returns
/// The concatenation of all applicable tokens, function-level first, then
/// instance-level. Concatenation order is stable so keys stay
/// deterministic.
pub(crate) fn memoize_version(
    cache: &Cache,
    namespace: &str,
    instance_namespace: Option<&str>,
    options: VersionOptions,
) -> Option<String> {
    let mut fetch_keys = vec![version_key(namespace)];
    if let Some(instance) = instance_namespace {
        fetch_keys.push(version_key(instance));
    }

    // Only delete the per-instance version key or the per-function
    // version key, not both.
    if options.delete {
        if let Some(most_specific) = fetch_keys.last() {
            cache.delete_many(&[most_specific.as_str()]);
        }
        return None;
    }

    let key_refs: Vec<&str> = fetch_keys.iter().map(String::as_str).collect();
    let mut versions: Vec<Option<String>> = cache
        .get_many(&key_refs)
        .into_iter()
        .map(|bytes| bytes.and_then(|b| String::from_utf8(b).ok()))
        .collect();

    let mut dirty = options.forced_dirty;

    for version in versions.iter_mut() {
        if version.is_none() {
            *version = Some(make_version_token());
            dirty = true;
        }
    }

    // Only reset the per-instance version or the per-function version,
    // not both.
    if options.reset {
        if let Some(most_specific) = fetch_keys.pop() {
            fetch_keys = vec![most_specific];
        }
        versions = vec![Some(make_version_token())];
        dirty = true;
    }

    if dirty {
        let mapping: Vec<(String, Vec<u8>)> = fetch_keys
            .iter()
            .zip(versions.iter())
            .filter_map(|(key, version)| {
                version
                    .as_ref()
                    .map(|token| (key.clone(), token.clone().into_bytes()))
            })
            .collect();
        cache.set_many(&mapping, options.timeout);
    }

    Some(versions.into_iter().flatten().collect())
}
