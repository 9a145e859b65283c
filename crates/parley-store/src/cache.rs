//! Fast-tier cache abstraction.
//!
//! [`FastCache`] is the seam a distributed cache (Redis GET/SET-EX) would
//! implement in a multi-process deployment. Values are serialized JSON
//! strings under composite string keys (`ctx:{conversation_id}`), matching
//! what a string-valued remote cache can hold.
//!
//! Every method is fallible: the two-tier store treats a cache failure as
//! "tier down" and falls through to durable storage.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::errors::CacheError;

/// Get/set-with-TTL cache operations.
pub trait FastCache: Send + Sync {
    /// Fetch the value for `key`, if present and unexpired.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any prior value and resetting
    /// the expiry to now + `ttl`.
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `key` immediately.
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL cache over a concurrent map.
///
/// Expiry is lazy (checked on read); [`MemoryCache::purge_expired`] bounds
/// memory in long-running processes.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries (expired entries may still be counted until
    /// the next read or purge).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before - self.entries.len()
    }
}

impl FastCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                drop(self.entries.remove(key));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let _ = self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _ = self.entries.remove(key);
        Ok(())
    }
}
