//! File-backed expiring cache store
//!
//! An `ExpiringCache` owns exactly one JSON file, `<cache_dir>/<cache_key>.json`,
//! holding a single value and an optional absolute expiry. Expiry is evaluated
//! lazily when the entry is read; nothing sweeps expired files.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors surfaced by cache writes
///
/// Reads never produce these: a missing or corrupt entry is a cache miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Creating the cache directory or writing the file failed
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The value could not be serialized to JSON
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reasons a cache file is rejected on read
#[derive(Debug, Error)]
enum EntryError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entry is not a JSON object")]
    NotAnObject,

    #[error("entry is missing the `{0}` field")]
    MissingField(&'static str),
}

/// Wrapper struct for a cached value stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached value
    value: T,
    /// Absolute expiry in epoch milliseconds, `None` for never
    expires: Option<i64>,
}

impl<T: DeserializeOwned> CacheEntry<T> {
    /// Parses file contents, requiring both `value` and `expires` to be present
    ///
    /// A plain typed deserialize would accept a missing `expires` as `None`, so
    /// the shape is checked on the untyped document first.
    fn parse(content: &str) -> Result<Self, EntryError> {
        let raw: Value = serde_json::from_str(content)?;
        let object = raw.as_object().ok_or(EntryError::NotAnObject)?;
        for field in ["value", "expires"] {
            if !object.contains_key(field) {
                return Err(EntryError::MissingField(field));
            }
        }
        Ok(serde_json::from_value(raw)?)
    }
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now_millis: i64) -> bool {
        matches!(self.expires, Some(expires) if expires < now_millis)
    }
}

/// Computes the absolute expiry for an entry written now
fn expiry_after(time_to_live: Option<Duration>) -> Option<i64> {
    time_to_live.map(|ttl| {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Utc::now().timestamp_millis().saturating_add(ttl_millis)
    })
}

/// A durable, expiring, single-value slot backed by one file
///
/// Each instance serializes its own file operations, so a `refresh`
/// read-modify-write never interleaves with a `set` issued through the same
/// instance. There is no locking across processes or across instances that
/// happen to share a key.
#[derive(Debug)]
pub struct ExpiringCache<T> {
    cache_key: String,
    path: PathBuf,
    time_to_live: Option<Duration>,
    lock: Mutex<()>,
    _value: PhantomData<fn() -> T>,
}

impl<T> ExpiringCache<T> {
    /// Creates a store for `cache_key` inside `cache_dir`
    ///
    /// Nothing touches the filesystem until the first write. A `time_to_live`
    /// of `None` makes every `set` write a non-expiring entry.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        cache_key: impl Into<String>,
        time_to_live: Option<Duration>,
    ) -> Self {
        let cache_key = cache_key.into();
        let path = cache_dir.into().join(format!("{}.json", cache_key));
        Self {
            cache_key,
            path,
            time_to_live,
            lock: Mutex::new(()),
            _value: PhantomData,
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live
    }

    /// Returns the cached value if present, well-formed and unexpired
    ///
    /// Any read or parse problem is logged and reported as a miss.
    pub async fn get(&self) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let _guard = self.lock.lock().await;
        let content = self.read_file().await?;

        let entry = match CacheEntry::<T>::parse(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %self.cache_key, error = %e, "Ignoring invalid cache file");
                return None;
            }
        };

        if entry.is_expired(Utc::now().timestamp_millis()) {
            debug!(key = %self.cache_key, expires = ?entry.expires, "Cache entry expired");
            return None;
        }

        Some(entry.value)
    }

    /// Replaces the entry with `value`, expiring after the store's TTL
    ///
    /// # Errors
    /// Returns `CacheError` if the directory cannot be created or the file
    /// cannot be written.
    pub async fn set(&self, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let entry = CacheEntry {
            value,
            expires: expiry_after(self.time_to_live),
        };
        let json = serde_json::to_string(&entry)?;

        let _guard = self.lock.lock().await;
        self.write_file(&json).await?;
        debug!(key = %self.cache_key, expires = ?entry.expires, "Cache entry written");
        Ok(())
    }

    /// Pushes the expiry of an existing entry to `now + duration`
    ///
    /// `None` makes the entry permanent. The stored value is rewritten exactly
    /// as it was read. Does nothing if there is no entry, or if the entry on
    /// disk is not a valid cache entry.
    pub async fn refresh(&self, duration: Option<Duration>) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        let Some(content) = self.read_file().await else {
            return Ok(());
        };

        let mut entry = match CacheEntry::<Value>::parse(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %self.cache_key, error = %e, "Not refreshing invalid cache file");
                return Ok(());
            }
        };

        entry.expires = expiry_after(duration);
        let json = serde_json::to_string(&entry)?;
        self.write_file(&json).await?;
        debug!(key = %self.cache_key, expires = ?entry.expires, "Cache entry refreshed");
        Ok(())
    }

    /// Refreshes using the store's own TTL
    pub async fn refresh_default(&self) -> Result<(), CacheError> {
        self.refresh(self.time_to_live).await
    }

    /// Deletes the backing file; a missing file is not an error
    pub async fn clear(&self) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(key = %self.cache_key, "Cache entry cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the backing file, treating missing, unreadable and empty files alike
    async fn read_file(&self) -> Option<String> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => None,
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key = %self.cache_key, error = %e, "Failed to read cache file");
                None
            }
        }
    }

    /// Writes through a sibling temp file so readers never see a torn entry
    async fn write_file(&self, json: &str) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}
