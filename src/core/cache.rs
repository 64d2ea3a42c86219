//! Short-lived result cache
//!
//! Query results are cached under a key derived from the serialized query,
//! so repeated identical requests within the TTL skip the source entirely.
//! Expired entries are dropped when read and on every insert. Failed
//! computations are never cached.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};

struct Entry<V> {
    stored: Instant,
    value: V,
}

/// TTL cache with interior mutability
pub struct ResultCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh cached value for `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.stored.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value`, pruning expired entries first
    pub fn insert(&self, key: String, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored.elapsed() < ttl);
        entries.insert(
            key,
            Entry {
                stored: Instant::now(),
                value,
            },
        );
    }

    /// Return the cached value or compute, store and return a new one
    ///
    /// The lock is not held while `compute` runs.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &str,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            tracing::debug!(key, "result cache hit");
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// SHA-256 hex digest of a string
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache key for a serializable input: `tag:sha256(json)`
pub fn cache_key<T: Serialize>(tag: &str, input: &T) -> String {
    // serializing plain data structs cannot fail; fall back to the tag alone
    let json = serde_json::to_string(input).unwrap_or_default();
    format!("{}:{}", tag, compute_hash(&json))
}
