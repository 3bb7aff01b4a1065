//! Memoized Wrapper Module
//!
//! The explicit wrapper object around a callable: it owns the callable,
//! its static identity and declared signature, and the options that shape
//! cache-key derivation. The invalidation surface on [`Cache`] operates
//! on this wrapper because rebuilding a key requires the live signature.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::cache::Cache;
use crate::error::Result;
use crate::memo::args::{canonicalize, CallArgs, Signature};
use crate::memo::identity::{function_namespace, FnName};
use crate::memo::key::{build_key, HashMethod};
use crate::memo::version::{memoize_version, VersionOptions};

// == Predicate Types ==
type ArgsPredicate = Box<dyn Fn(&CallArgs) -> bool + Send + Sync>;
type NameMapper = Box<dyn Fn(&str) -> String + Send + Sync>;

// == Memoized ==
/// A callable wrapped for memoization.
///
/// Results are cached under a key derived from the function identity, the
/// canonicalized call arguments and the current version tokens, so equal
/// calls hit the cache and a version bump invalidates the whole scope.
pub struct Memoized<F, R> {
    /// The wrapped callable
    func: F,
    /// Static identity of the callable
    name: FnName,
    /// Declared parameter order of the callable
    signature: Signature,
    /// Timeout for cached results in seconds (None = cache default)
    timeout: Option<u64>,
    /// Optional mapper from the derived namespace to an alternate key name
    make_name: Option<NameMapper>,
    /// Bypasses the cache entirely when true
    unless: Option<ArgsPredicate>,
    /// Forces recomputation and a TTL refresh when true
    forced_update: Option<ArgsPredicate>,
    /// May veto caching a computed result
    response_filter: Option<Box<dyn Fn(&R) -> bool + Send + Sync>>,
    /// Digest used for key compaction
    hash_method: HashMethod,
    /// Whether a cached null result is distinguishable from "not cached"
    cache_none: bool,
}

impl<F, R> Memoized<F, R>
where
    F: Fn(&CallArgs) -> R,
    R: Serialize + DeserializeOwned,
{
    // == Constructor ==
    /// Wraps a callable under its static identity and declared signature.
    pub fn new(name: FnName, signature: Signature, func: F) -> Self {
        Self {
            func,
            name,
            signature,
            timeout: None,
            make_name: None,
            unless: None,
            forced_update: None,
            response_filter: None,
            hash_method: HashMethod::default(),
            cache_none: false,
        }
    }

    // == Builder Options ==
    /// Sets the cache timeout in seconds (0 = cached results never expire).
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// Maps the derived namespace to an alternate name used in the key.
    pub fn make_name(mut self, mapper: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.make_name = Some(Box::new(mapper));
        self
    }

    /// Bypasses the cache entirely whenever the predicate is true.
    pub fn unless(mut self, predicate: impl Fn(&CallArgs) -> bool + Send + Sync + 'static) -> Self {
        self.unless = Some(Box::new(predicate));
        self
    }

    /// Recomputes the value regardless of cache state whenever the
    /// predicate is true. Useful for background renewal of cached results.
    pub fn forced_update(
        mut self,
        predicate: impl Fn(&CallArgs) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.forced_update = Some(Box::new(predicate));
        self
    }

    /// Inspects a computed result and vetoes caching it when false
    /// (for example, never cache error-shaped results).
    pub fn response_filter(
        mut self,
        filter: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.response_filter = Some(Box::new(filter));
        self
    }

    /// Selects the digest used for key compaction.
    pub fn hash_method(mut self, method: HashMethod) -> Self {
        self.hash_method = method;
        self
    }

    /// Caches null results distinguishably, at the cost of an extra
    /// existence probe on every null read.
    pub fn cache_none(mut self, enabled: bool) -> Self {
        self.cache_none = enabled;
        self
    }

    // == Accessors ==
    /// Returns the configured cache timeout.
    pub fn cache_timeout(&self) -> Option<u64> {
        self.timeout
    }

    /// Returns the static identity of the wrapped callable.
    pub fn name(&self) -> &FnName {
        &self.name
    }

    /// Returns the declared signature of the wrapped callable.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Invokes the wrapped callable directly, without touching the cache.
    pub fn uncached(&self, args: &CallArgs) -> R {
        (self.func)(args)
    }

    // == Key Construction ==
    /// Builds the cache key for one call.
    ///
    /// Version tokens are fetched (and lazily created) first, so the key
    /// always incorporates the current version of every applicable scope.
    ///
    /// # Errors
    /// Fails fast on receiver misuse instead of producing a wrong key.
    pub fn make_cache_key(&self, cache: &Cache, args: &CallArgs) -> Result<String> {
        let (namespace, instance_namespace) =
            function_namespace(&self.name, &self.signature, args.receiver())?;

        let version = memoize_version(
            cache,
            &namespace,
            instance_namespace.as_deref(),
            VersionOptions {
                forced_dirty: self.evaluate_forced(args),
                timeout: self.timeout,
                ..VersionOptions::default()
            },
        )
        .unwrap_or_default();

        let altname = match &self.make_name {
            Some(mapper) => mapper(&namespace),
            None => namespace,
        };

        let (ordered_args, ordered_kwargs) = canonicalize(&self.signature, args)?;
        build_key(
            &altname,
            &ordered_args,
            &ordered_kwargs,
            self.hash_method,
            &version,
        )
    }

    // == Call ==
    /// Calls through the cache: returns the cached result when one exists,
    /// otherwise invokes the callable and stores its result.
    ///
    /// # Errors
    /// Usage errors from key construction are raised. With the strict
    /// config flag set, decode failures are raised as well; otherwise the
    /// call logs and falls back to direct execution.
    pub fn call(&self, cache: &Cache, args: &CallArgs) -> Result<R> {
        if let Some(unless) = &self.unless {
            if unless(args) {
                return Ok((self.func)(args));
            }
        }

        let key = self.make_cache_key(cache, args)?;

        if !self.evaluate_forced(args) {
            if let Some(cached) = self.lookup(cache, &key)? {
                return Ok(cached);
            }
        }

        let value = (self.func)(args);

        if self.response_filter.as_ref().map_or(true, |f| f(&value)) {
            match serde_json::to_vec(&value) {
                Ok(bytes) => {
                    cache.set(&key, &bytes, self.timeout);
                }
                Err(err) => {
                    if cache.config().strict {
                        return Err(err.into());
                    }
                    warn!("Failed to encode memoized result, not caching: {}", err);
                }
            }
        }

        Ok(value)
    }

    /// Reads and decodes a cached result.
    ///
    /// A null payload reads as a miss unless caching null was requested,
    /// in which case an extra existence probe decides. Cached null results
    /// can be wrongly reported under concurrent writers; callers opting in
    /// accept that.
    fn lookup(&self, cache: &Cache, key: &str) -> Result<Option<R>> {
        let bytes = match cache.get(key) {
            Some(bytes) => bytes,
            None => {
                if self.cache_none && cache.has(key) {
                    return Ok(serde_json::from_slice(b"null").ok());
                }
                return Ok(None);
            }
        };

        if bytes == b"null" {
            if self.cache_none && cache.has(key) {
                return Ok(serde_json::from_slice(&bytes).ok());
            }
            return Ok(None);
        }

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                if cache.config().strict {
                    return Err(err.into());
                }
                warn!("Failed to decode cached result, recomputing: {}", err);
                Ok(None)
            }
        }
    }

    fn evaluate_forced(&self, args: &CallArgs) -> bool {
        self.forced_update.as_ref().is_some_and(|p| p(args))
    }
}

// == Invalidation Surface ==
impl Cache {
    /// Invalidates cached results of a memoized callable.
    ///
    /// With empty call arguments, the most specific version scope is
    /// bumped (the instance scope when `args` carries a receiver, else the
    /// function scope), invalidating every argument set at once. Cached
    /// records stay behind, orphaned under the old version until their own
    /// expiry reclaims them.
    ///
    /// With call arguments, only the exact record for those arguments is
    /// rebuilt under the current version and deleted.
    pub fn delete_memoized<F, R>(&self, memoized: &Memoized<F, R>, args: &CallArgs) -> Result<()>
    where
        F: Fn(&CallArgs) -> R,
        R: Serialize + DeserializeOwned,
    {
        if args.is_empty() {
            let (namespace, instance_namespace) =
                function_namespace(memoized.name(), memoized.signature(), args.receiver())?;
            memoize_version(
                self,
                &namespace,
                instance_namespace.as_deref(),
                VersionOptions {
                    reset: true,
                    ..VersionOptions::default()
                },
            );
            Ok(())
        } else {
            let key = memoized.make_cache_key(self, args)?;
            self.delete(&key);
            Ok(())
        }
    }

    /// Deletes the version key of a memoized callable outright.
    ///
    /// The next lookup regenerates it lazily. Records cached under the
    /// deleted version are orphaned, and stay in the backend indefinitely
    /// if they were stored without a timeout.
    pub fn delete_memoized_verhash<F, R>(
        &self,
        memoized: &Memoized<F, R>,
        args: &CallArgs,
    ) -> Result<()>
    where
        F: Fn(&CallArgs) -> R,
        R: Serialize + DeserializeOwned,
    {
        let (namespace, instance_namespace) =
            function_namespace(memoized.name(), memoized.signature(), args.receiver())?;
        memoize_version(
            self,
            &namespace,
            instance_namespace.as_deref(),
            VersionOptions {
                delete: true,
                ..VersionOptions::default()
            },
        );
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendRegistry;
    use crate::config::CacheConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_cache() -> Cache {
        let registry = BackendRegistry::with_defaults();
        Cache::new(CacheConfig::with_backend("memory"), &registry).unwrap()
    }

    fn counting_adder(calls: &AtomicUsize) -> Memoized<impl Fn(&CallArgs) -> i64 + '_, i64> {
        Memoized::new(
            FnName::new("app", "add"),
            Signature::new(["a", "b"]),
            move |args: &CallArgs| {
                let run = calls.fetch_add(1, Ordering::SeqCst) as i64;
                let a = args.positional()[0].as_i64().unwrap_or(0);
                let b = args.positional()[1].as_i64().unwrap_or(0);
                a + b + run * 1000
            },
        )
    }

    #[test]
    fn test_call_caches_result() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls).timeout(5);

        let first = memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();
        let second = memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_call_spellings_share_entry() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls);

        let positional = memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();
        let named = memo
            .call(&cache, &CallArgs::new().named("a", 5).named("b", 2))
            .unwrap();
        let mixed = memo
            .call(&cache, &CallArgs::new().arg(5).named("b", 2))
            .unwrap();

        assert_eq!(positional, named);
        assert_eq!(positional, mixed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_call_distinct_args_distinct_entries() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls);

        let first = memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();
        let other = memo.call(&cache, &CallArgs::new().arg(5).arg(3)).unwrap();

        assert_ne!(first, other);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delete_memoized_bumps_version() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls);

        let before = memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();
        cache.delete_memoized(&memo, &CallArgs::new()).unwrap();
        let after = memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();

        assert_ne!(before, after);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delete_memoized_exact_args_only() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls);

        let five_two = memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();
        let five_three = memo.call(&cache, &CallArgs::new().arg(5).arg(3)).unwrap();

        cache
            .delete_memoized(&memo, &CallArgs::new().arg(5).arg(2))
            .unwrap();

        let five_two_again = memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();
        let five_three_again = memo.call(&cache, &CallArgs::new().arg(5).arg(3)).unwrap();

        assert_ne!(five_two, five_two_again);
        assert_eq!(five_three, five_three_again);
    }

    #[test]
    fn test_delete_memoized_verhash_regenerates_lazily() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls);

        let before = memo.call(&cache, &CallArgs::new().arg(1).arg(1)).unwrap();
        cache.delete_memoized_verhash(&memo, &CallArgs::new()).unwrap();
        let after = memo.call(&cache, &CallArgs::new().arg(1).arg(1)).unwrap();

        // The fresh version token orphans the old record
        assert_ne!(before, after);
    }

    #[test]
    fn test_unless_bypasses_cache() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls).unless(|_| true);

        memo.call(&cache, &CallArgs::new().arg(1).arg(2)).unwrap();
        memo.call(&cache, &CallArgs::new().arg(1).arg(2)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_forced_update_recomputes() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls).forced_update(|_| true);

        memo.call(&cache, &CallArgs::new().arg(1).arg(2)).unwrap();
        memo.call(&cache, &CallArgs::new().arg(1).arg(2)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_response_filter_vetoes_caching() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls).response_filter(|_| false);

        memo.call(&cache, &CallArgs::new().arg(1).arg(2)).unwrap();
        memo.call(&cache, &CallArgs::new().arg(1).arg(2)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_null_result_recomputed_without_cache_none() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo: Memoized<_, Option<i64>> = Memoized::new(
            FnName::new("app", "find"),
            Signature::new(["a"]),
            |_: &CallArgs| {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            },
        );

        assert_eq!(memo.call(&cache, &CallArgs::new().arg(1)).unwrap(), None);
        assert_eq!(memo.call(&cache, &CallArgs::new().arg(1)).unwrap(), None);

        // A cached null reads as a miss, so the callable ran twice
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_null_result_cached_with_cache_none() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo: Memoized<_, Option<i64>> = Memoized::new(
            FnName::new("app", "find"),
            Signature::new(["a"]),
            |_: &CallArgs| {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            },
        )
        .cache_none(true);

        assert_eq!(memo.call(&cache, &CallArgs::new().arg(1)).unwrap(), None);
        assert_eq!(memo.call(&cache, &CallArgs::new().arg(1)).unwrap(), None);

        // The existence probe confirms the cached null
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_make_name_changes_key_material() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let plain = counting_adder(&calls);
        let renamed = Memoized::new(
            FnName::new("app", "add"),
            Signature::new(["a", "b"]),
            |_: &CallArgs| 0i64,
        )
        .make_name(|ns| format!("{}_v2", ns));

        let plain_key = plain
            .make_cache_key(&cache, &CallArgs::new().arg(1).arg(2))
            .unwrap();
        let renamed_key = renamed
            .make_cache_key(&cache, &CallArgs::new().arg(1).arg(2))
            .unwrap();

        assert_ne!(plain_key, renamed_key);
        // Both share the same namespace, so the version suffix agrees
        assert_eq!(&plain_key[16..], &renamed_key[16..]);
    }

    #[test]
    fn test_uncached_skips_cache() {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let memo = counting_adder(&calls);

        memo.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();
        let direct = memo.uncached(&CallArgs::new().arg(5).arg(2));

        // The direct call recomputed instead of reading the cache
        assert_eq!(direct, 5 + 2 + 1000);
    }
}
