//! Integration Tests for Memoization
//!
//! Full scenarios through the public API: cached calls, instance scoping,
//! invalidation and strict-mode decode failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::sleep;
use std::time::Duration;

use anyhow::Result;
use memocache::{
    BackendRegistry, Cache, CacheConfig, CacheError, CacheIdentity, CallArgs, FnName, Memoized,
    Receiver, Signature,
};

// == Helper Functions ==

fn memory_cache() -> Cache {
    let registry = BackendRegistry::with_defaults();
    Cache::new(CacheConfig::with_backend("memory"), &registry).unwrap()
}

/// Builds f(a, b) = a + b + <run counter * 1000>, so repeated executions
/// of the function body are observable in the result.
fn counting_adder(calls: &AtomicUsize) -> Memoized<impl Fn(&CallArgs) -> i64 + Sync + '_, i64> {
    Memoized::new(
        FnName::new("tests.memoize", "add"),
        Signature::new(["a", "b"]),
        move |args: &CallArgs| {
            let run = calls.fetch_add(1, Ordering::SeqCst) as i64;
            let a = args.positional()[0].as_i64().unwrap_or(0);
            let b = args.positional()[1].as_i64().unwrap_or(0);
            a + b + run * 1000
        },
    )
}

// == Memoization Scenario Tests ==

#[test]
fn test_memoized_scenario() -> Result<()> {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let f = counting_adder(&calls).timeout(5);

    // Two calls with the same arguments within the timeout agree
    let first = f.call(&cache, &CallArgs::new().arg(5).arg(2))?;
    let repeat = f.call(&cache, &CallArgs::new().arg(5).arg(2))?;
    assert_eq!(first, repeat);

    // Different arguments compute a different value
    let other = f.call(&cache, &CallArgs::new().arg(5).arg(3))?;
    assert_ne!(first, other);

    // After invalidation the same arguments compute a fresh value
    cache.delete_memoized(&f, &CallArgs::new())?;
    let fresh = f.call(&cache, &CallArgs::new().arg(5).arg(2))?;
    assert_ne!(first, fresh);

    Ok(())
}

#[test]
fn test_memoized_result_expires() -> Result<()> {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let f = counting_adder(&calls).timeout(1);

    let first = f.call(&cache, &CallArgs::new().arg(1).arg(2))?;
    sleep(Duration::from_millis(1100));
    let second = f.call(&cache, &CallArgs::new().arg(1).arg(2))?;

    assert_ne!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_memoized_over_filesystem_backend() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let registry = BackendRegistry::with_defaults();
    let cache = Cache::new(
        CacheConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..CacheConfig::with_backend("filesystem")
        },
        &registry,
    )?;

    let calls = AtomicUsize::new(0);
    let f = counting_adder(&calls).timeout(30);

    let first = f.call(&cache, &CallArgs::new().arg(2).arg(3))?;
    let repeat = f.call(&cache, &CallArgs::new().arg(2).arg(3))?;

    assert_eq!(first, repeat);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Profile {
    id: u64,
    name: String,
    lookups: usize,
}

#[test]
fn test_memoized_struct_result_roundtrips() -> Result<()> {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let fetch = Memoized::new(
        FnName::new("tests.memoize", "fetch_profile"),
        Signature::new(["id"]),
        |args: &CallArgs| Profile {
            id: args.positional()[0].as_u64().unwrap_or(0),
            name: "Ada".to_string(),
            lookups: calls.fetch_add(1, Ordering::SeqCst),
        },
    )
    .timeout(30);

    let first = fetch.call(&cache, &CallArgs::new().arg(7))?;
    let cached = fetch.call(&cache, &CallArgs::new().arg(7))?;

    assert_eq!(first, cached);
    assert_eq!(cached.id, 7);
    assert_eq!(cached.name, "Ada");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

// == Instance Scoping Tests ==

#[derive(Debug)]
struct Adder {
    group: &'static str,
}

impl CacheIdentity for Adder {
    fn cache_identity(&self) -> String {
        format!("Adder_{}", self.group)
    }
}

fn bound_adder(calls: &AtomicUsize) -> Memoized<impl Fn(&CallArgs) -> i64 + Sync + '_, i64> {
    Memoized::new(
        FnName::new("tests.memoize", "Adder.add"),
        Signature::new(["self", "b"]),
        move |args: &CallArgs| {
            let run = calls.fetch_add(1, Ordering::SeqCst) as i64;
            let b = args.positional()[0].as_i64().unwrap_or(0);
            b + run * 1000
        },
    )
}

#[test]
fn test_equal_identity_shares_entry() -> Result<()> {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let add = bound_adder(&calls);

    let first = Adder { group: "alpha" };
    let second = Adder { group: "alpha" };

    let a = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&first)).arg(3),
    )?;
    let b = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&second)).arg(3),
    )?;

    assert_eq!(a, b);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_distinct_identity_gets_own_entry() -> Result<()> {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let add = bound_adder(&calls);

    let alpha = Adder { group: "alpha" };
    let beta = Adder { group: "beta" };

    let a = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&alpha)).arg(3),
    )?;
    let b = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&beta)).arg(3),
    )?;

    assert_ne!(a, b);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_instance_invalidation_leaves_other_instance() -> Result<()> {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let add = bound_adder(&calls);

    let alpha = Adder { group: "alpha" };
    let beta = Adder { group: "beta" };

    let alpha_before = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&alpha)).arg(3),
    )?;
    let beta_before = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&beta)).arg(3),
    )?;

    // Reset only alpha's scope: the receiver rides along with no values
    cache.delete_memoized(
        &add,
        &CallArgs::new().with_receiver(Receiver::instance(&alpha)),
    )?;

    let alpha_after = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&alpha)).arg(3),
    )?;
    let beta_after = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&beta)).arg(3),
    )?;

    assert_ne!(alpha_before, alpha_after);
    assert_eq!(beta_before, beta_after);
    Ok(())
}

#[test]
fn test_function_invalidation_clears_all_instances() -> Result<()> {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let add = bound_adder(&calls);

    let alpha = Adder { group: "alpha" };
    let beta = Adder { group: "beta" };

    let alpha_before = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&alpha)).arg(3),
    )?;
    let beta_before = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&beta)).arg(3),
    )?;

    // No receiver at all resets the function-level scope
    cache.delete_memoized(&add, &CallArgs::new())?;

    let alpha_after = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&alpha)).arg(3),
    )?;
    let beta_after = add.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&beta)).arg(3),
    )?;

    assert_ne!(alpha_before, alpha_after);
    assert_ne!(beta_before, beta_after);
    Ok(())
}

// == Classmethod-Style Tests ==

#[test]
fn test_classmethod_requires_class_receiver() {
    let cache = memory_cache();
    let make: Memoized<_, i64> = Memoized::new(
        FnName::new("tests.memoize", "Adder.make"),
        Signature::new(["cls", "b"]),
        |_: &CallArgs| 0,
    );

    let instance = Adder { group: "alpha" };
    let wrong = make.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::instance(&instance)).arg(3),
    );
    assert!(matches!(wrong, Err(CacheError::Usage(_))));

    let valid = make.call(
        &cache,
        &CallArgs::new().with_receiver(Receiver::class("Adder")).arg(3),
    );
    assert!(valid.is_ok());
}

// == Strict Mode Tests ==

#[test]
fn test_corrupt_record_recomputed_by_default() -> Result<()> {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let f = counting_adder(&calls);

    let args = CallArgs::new().arg(1).arg(2);
    f.call(&cache, &args)?;

    // Poison the cached payload behind the wrapper's back
    let key = f.make_cache_key(&cache, &args)?;
    cache.set(&key, b"not json", None);

    let recomputed = f.call(&cache, &args)?;
    assert_eq!(recomputed, 1 + 2 + 1000);
    Ok(())
}

#[test]
fn test_corrupt_record_raises_in_strict_mode() -> Result<()> {
    let registry = BackendRegistry::with_defaults();
    let cache = Cache::new(
        CacheConfig {
            strict: true,
            ..CacheConfig::with_backend("memory")
        },
        &registry,
    )?;

    let calls = AtomicUsize::new(0);
    let f = counting_adder(&calls);

    let args = CallArgs::new().arg(1).arg(2);
    f.call(&cache, &args)?;

    let key = f.make_cache_key(&cache, &args)?;
    cache.set(&key, b"not json", None);

    let result = f.call(&cache, &args);
    assert!(matches!(result, Err(CacheError::Serialization(_))));
    Ok(())
}

// == Concurrency Tests ==

#[test]
fn test_concurrent_memoized_calls_agree() {
    let cache = memory_cache();
    let calls = AtomicUsize::new(0);
    let f = counting_adder(&calls).timeout(30);

    // Warm the cache so every thread observes the same value
    let expected = f.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    let value = f.call(&cache, &CallArgs::new().arg(5).arg(2)).unwrap();
                    assert_eq!(value, expected);
                }
            });
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
