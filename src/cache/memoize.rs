//! Memoization of async producers over an `ExpiringCache`

use std::any::type_name;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

use super::store::{CacheError, ExpiringCache};

/// Fallback key when a producer's type name yields nothing usable
const FALLBACK_CACHE_KEY: &str = "memoized";

/// Options for wrapping a producer
#[derive(Debug, Clone, Default)]
pub struct MemoizeOptions {
    /// Cache key; derived from the producer's name when `None`
    pub cache_key: Option<String>,
    /// Lifetime of stored results; `None` never expires
    pub time_to_live: Option<Duration>,
}

/// A produced value together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub value: T,
    /// `true` when served from the cache without calling the producer
    pub from_cache: bool,
}

/// Errors from a memoized call
#[derive(Debug, Error)]
pub enum MemoizeError<E> {
    /// The wrapped producer failed; nothing was cached
    #[error("Producer failed: {0}")]
    Producer(E),

    /// The producer succeeded but its result could not be stored
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// An async producer whose result is persisted in a single cache slot
///
/// The cache key is fixed when the wrapper is built and does not depend on
/// the arguments passed to [`Memoized::call`]. Every call shares one slot, so
/// this only suits producers that behave like a zero-argument singleton: a
/// call with different arguments will happily return a value computed for
/// other ones until the entry expires.
pub struct Memoized<T, F> {
    cache: ExpiringCache<T>,
    producer: F,
}

impl<T, F> Memoized<T, F> {
    /// Wraps `producer`, storing its results under `cache_dir`
    ///
    /// Without an explicit `cache_key` the key is the producer's name: for a
    /// plain `fn` item that is the function's own name.
    pub fn new(cache_dir: impl Into<PathBuf>, producer: F, options: MemoizeOptions) -> Self {
        let cache_key = options
            .cache_key
            .unwrap_or_else(default_cache_key::<F>);
        Self {
            cache: ExpiringCache::new(cache_dir, cache_key, options.time_to_live),
            producer,
        }
    }

    /// The backing store, for clearing or refreshing the slot
    pub fn cache(&self) -> &ExpiringCache<T> {
        &self.cache
    }

    /// Returns the cached value, or runs the producer and caches its result
    ///
    /// The write is awaited before returning, so a result handed back as a
    /// miss is already on disk.
    ///
    /// # Errors
    /// * `MemoizeError::Producer` if the producer fails
    /// * `MemoizeError::Cache` if the fresh result cannot be stored
    pub async fn lookup<A, Fut, E>(&self, args: A) -> Result<Lookup<T>, MemoizeError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        if let Some(value) = self.cache.get().await {
            debug!(key = %self.cache.cache_key(), "Memoized value served from cache");
            return Ok(Lookup {
                value,
                from_cache: true,
            });
        }

        let value = (self.producer)(args).await.map_err(MemoizeError::Producer)?;
        self.cache.set(&value).await?;

        Ok(Lookup {
            value,
            from_cache: false,
        })
    }

    /// Like [`Memoized::lookup`], discarding the hit/miss flag
    pub async fn call<A, Fut, E>(&self, args: A) -> Result<T, MemoizeError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        self.lookup(args).await.map(|lookup| lookup.value)
    }
}

/// Derives a file-safe key from the last path segment of `F`'s type name
fn default_cache_key<F>() -> String {
    let full_name = type_name::<F>();
    let without_generics = full_name.split('<').next().unwrap_or(full_name);
    let last_segment = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);

    let key: String = last_segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if key.is_empty() {
        FALLBACK_CACHE_KEY.to_string()
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn fetch_county_names(_: ()) -> Result<Vec<String>, String> {
        Ok(vec!["Hinds".to_string(), "Rankin".to_string()])
    }

    fn options(key: &str, ttl: Option<Duration>) -> MemoizeOptions {
        MemoizeOptions {
            cache_key: Some(key.to_string()),
            time_to_live: ttl,
        }
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memoized = Memoized::new(
            temp_dir.path(),
            move |_: ()| {
                let n = counter.fetch_add(1, Ordering::SeqCst) as u32;
                async move { Ok::<u32, String>(n + 100) }
            },
            options("counter", Some(Duration::from_secs(3600))),
        );

        let first = memoized.lookup(()).await.expect("First call should succeed");
        let second = memoized.lookup(()).await.expect("Second call should succeed");

        assert_eq!(first, Lookup { value: 100, from_cache: false });
        assert_eq!(second, Lookup { value: 100, from_cache: true });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_invokes_producer_again() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memoized = Memoized::new(
            temp_dir.path(),
            move |_: ()| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<String, String>("fresh".to_string()) }
            },
            options("short", Some(Duration::from_millis(20))),
        );

        memoized.call(()).await.expect("First call should succeed");
        tokio::time::sleep(Duration::from_millis(60)).await;
        memoized.call(()).await.expect("Second call should succeed");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_producer_error_is_not_cached() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memoized = Memoized::new(
            temp_dir.path(),
            move |_: ()| {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err("upstream down".to_string())
                    } else {
                        Ok(attempt as u32)
                    }
                }
            },
            options("flaky", None),
        );

        let first = memoized.call(()).await;
        assert!(matches!(
            first,
            Err(MemoizeError::Producer(ref msg)) if msg.as_str() == "upstream down"
        ));
        assert!(!memoized.cache().path().exists());

        let second = memoized.call(()).await.expect("Retry should succeed");
        assert_eq!(second, 1);
    }

    #[tokio::test]
    async fn test_calls_with_different_arguments_share_one_slot() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let memoized = Memoized::new(
            temp_dir.path(),
            |county: &'static str| async move { Ok::<String, String>(county.to_uppercase()) },
            options("shared", None),
        );

        let first = memoized.call("hinds").await.expect("First call should succeed");
        let second = memoized.call("rankin").await.expect("Second call should succeed");

        assert_eq!(first, "HINDS");
        assert_eq!(second, "HINDS");
    }

    #[tokio::test]
    async fn test_cache_write_failure_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").expect("Should create file");
        let memoized = Memoized::new(
            blocker.join("cache"),
            |_: ()| async { Ok::<u32, String>(1) },
            options("unwritable", None),
        );

        let result = memoized.call(()).await;

        assert!(matches!(result, Err(MemoizeError::Cache(CacheError::Io(_)))));
    }

    #[tokio::test]
    async fn test_clearing_cache_forces_recompute() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let memoized = Memoized::new(
            temp_dir.path(),
            fetch_county_names,
            MemoizeOptions::default(),
        );

        memoized.call(()).await.expect("Call should succeed");
        memoized.cache().clear().await.expect("Clear should succeed");

        let lookup = memoized.lookup(()).await.expect("Call should succeed");
        assert!(!lookup.from_cache);
        assert_eq!(lookup.value, vec!["Hinds".to_string(), "Rankin".to_string()]);
    }

    #[test]
    fn test_default_key_is_function_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let memoized: Memoized<Vec<String>, _> =
            Memoized::new(temp_dir.path(), fetch_county_names, MemoizeOptions::default());

        assert_eq!(memoized.cache().cache_key(), "fetch_county_names");
        assert!(memoized
            .cache()
            .path()
            .ends_with("fetch_county_names.json"));
    }

    fn default_key_of<F>(_: &F) -> String {
        default_cache_key::<F>()
    }

    #[test]
    fn test_default_key_for_closure_is_file_safe() {
        let producer = |_: ()| async { Ok::<u32, String>(7) };
        let key = default_key_of(&producer);
        assert!(!key.is_empty());
        assert!(key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_explicit_key_overrides_default() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let memoized: Memoized<Vec<String>, _> = Memoized::new(
            temp_dir.path(),
            fetch_county_names,
            options("burn-bans", None),
        );

        assert_eq!(memoized.cache().cache_key(), "burn-bans");
    }
}
