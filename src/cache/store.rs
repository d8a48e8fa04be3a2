//! In-memory cache store keyed by string
//!
//! Provides a `CacheStore` that holds opaque serialized payloads together with
//! the instant they were stored. Freshness is decided by the caller-supplied TTL
//! at read time, so one store can serve endpoints with different lifetimes.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A single cached payload
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The serialized payload, treated as an immutable blob
    pub payload: String,
    /// When the payload was stored
    pub stored_at: Instant,
}

impl CacheEntry {
    /// Whether the entry is still fresh for the given TTL
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Process-wide key/value store with TTL-aware reads
///
/// The store holds at most one entry per key (last write wins). Expired entries
/// stay visible to [`CacheStore::get_stale`] until a fresh read notices the
/// expiry and evicts them.
///
/// The map sits behind a mutex because the proxy runs on a multi-threaded
/// runtime; the lock is never held across an await point.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload for `key` if it was stored less than `ttl` ago
    ///
    /// An entry that exists but has expired is evicted as a side effect and
    /// `None` is returned.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(ttl, now) => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                tracing::trace!(cache_key = key, "evicted expired cache entry");
                None
            }
            None => None,
        }
    }

    /// Returns the payload for `key` regardless of its age, without evicting
    pub fn get_stale(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).map(|entry| entry.payload.clone())
    }

    /// Returns the whole entry for `key` without evicting, fresh or not
    ///
    /// Callers that may still need an expired payload as a fallback read
    /// through this instead of [`CacheStore::get`].
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    /// Stores `payload` under `key`, replacing any existing entry
    pub fn set(&self, key: impl Into<String>, payload: impl Into<String>) {
        let entry = CacheEntry {
            payload: payload.into(),
            stored_at: Instant::now(),
        };
        self.entries.lock().insert(key.into(), entry);
    }

    /// Number of entries currently held, fresh or stale
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Moves the stored time of `key` back by `age`
    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &str, age: Duration) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.stored_at -= age;
        }
    }
}
