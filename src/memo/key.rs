//! Cache Key Builder Module
//!
//! Combines a function's namespace, its canonicalized arguments and the
//! current version tokens into a fixed-length cache key.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};

use crate::error::Result;

// == Constants ==
/// Number of characters kept from the encoded digest.
const KEY_LEN: usize = 16;

// == Hash Method ==
/// The digest used to compact the key material.
///
/// MD5 is the default: the digest provides key compaction and uniqueness,
/// not secrecy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashMethod {
    /// 128-bit MD5 digest (default)
    #[default]
    Md5,
    /// SHA-256 digest
    Sha256,
    /// SHA-512 digest
    Sha512,
}

impl HashMethod {
    /// Digests the given key material.
    pub(crate) fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashMethod::Md5 => md5::compute(data).0.to_vec(),
            HashMethod::Sha256 => Sha256::digest(data).to_vec(),
            HashMethod::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

// == Key Builder ==
/// Builds the cache key for one memoized call.
///
/// The alternate name and the canonical argument forms are concatenated
/// and digested to a fixed short textual form; the version string is then
/// appended verbatim, not hashed, so version bumps stay visible in the
/// key and guarantee invalidation independent of digest collisions.
pub(crate) fn build_key(
    altname: &str,
    ordered_args: &[Value],
    ordered_kwargs: &BTreeMap<String, Value>,
    hash_method: HashMethod,
    version: &str,
) -> Result<String> {
    let args_form = serde_json::to_string(ordered_args)?;
    let kwargs_form = serde_json::to_string(ordered_kwargs)?;
    let material = format!("{}{}{}", altname, args_form, kwargs_form);

    let digest = hash_method.digest(material.as_bytes());
    let mut key = BASE64.encode(digest);
    key.truncate(KEY_LEN);
    key.push_str(version);
    Ok(key)
}
