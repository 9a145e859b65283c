//! Shared counter storage for admission policies.
//!
//! [`CounterStore`] is the seam a distributed cache (Redis `INCR`/`EXPIRE`)
//! would implement in a multi-process deployment; [`MemoryCounters`] is the
//! in-process implementation used in single-node deployments and tests.
//! Keys are composite strings (`rate:{subject}`, `conns:{subject}`, ...).

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Atomic counter operations with per-key expiry.
///
/// INVARIANTS:
/// - Counters are never negative ([`CounterStore::decr`] saturates at 0).
/// - Expiry is set only on the first increment of a fresh window; later
///   increments in the same window never extend it.
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key`, starting a fresh window with `ttl` if
    /// the key is absent or expired. Returns the post-increment count.
    fn incr_with_expiry(&self, key: &str, ttl: Duration) -> u64;

    /// Decrement `key`, saturating at zero. The window expiry is kept.
    fn decr(&self, key: &str);

    /// Current count, or `None` if absent or expired.
    fn get(&self, key: &str) -> Option<u64>;

    /// Set a marker key that expires after `ttl` (block flags).
    fn set_flag(&self, key: &str, ttl: Duration);

    /// Whether a live (unexpired) entry exists for `key`.
    fn exists(&self, key: &str) -> bool;

    /// Remove `key` immediately.
    fn delete(&self, key: &str);
}

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

impl CounterEntry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process counter store over a concurrent map.
///
/// Expired entries are replaced lazily on access; [`MemoryCounters::purge_expired`]
/// exists for long-running processes that want to bound memory.
#[derive(Default)]
pub struct MemoryCounters {
    entries: DashMap<String, CounterEntry>,
}

impl MemoryCounters {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired(now));
        before - self.entries.len()
    }
}

impl CounterStore for MemoryCounters {
    fn incr_with_expiry(&self, key: &str, ttl: Duration) -> u64 {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry {
                count: 0,
                expires_at: now + ttl,
            });
        if entry.expired(now) {
            // Fresh window: reset the count and set a new expiry.
            entry.count = 1;
            entry.expires_at = now + ttl;
        } else {
            entry.count += 1;
        }
        entry.count
    }

    fn decr(&self, key: &str) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.count = entry.count.saturating_sub(1);
        }
    }

    fn get(&self, key: &str) -> Option<u64> {
        let entry = self.entries.get(key)?;
        if entry.expired(Instant::now()) {
            None
        } else {
            Some(entry.count)
        }
    }

    fn set_flag(&self, key: &str, ttl: Duration) {
        let _ = self.entries.insert(
            key.to_string(),
            CounterEntry {
                count: 1,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn delete(&self, key: &str) {
        let _ = self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn incr_counts_within_window() {
        let store = MemoryCounters::new();
        assert_eq!(store.incr_with_expiry("rate:u1", TTL), 1);
        assert_eq!(store.incr_with_expiry("rate:u1", TTL), 2);
        assert_eq!(store.incr_with_expiry("rate:u1", TTL), 3);
        assert_eq!(store.get("rate:u1"), Some(3));
    }

    #[test]
    fn expired_window_restarts_at_one() {
        let store = MemoryCounters::new();
        let short = Duration::from_millis(20);
        assert_eq!(store.incr_with_expiry("rate:u1", short), 1);
        assert_eq!(store.incr_with_expiry("rate:u1", short), 2);
        std::thread::sleep(Duration::from_millis(30));
        assert!(store.get("rate:u1").is_none());
        assert_eq!(store.incr_with_expiry("rate:u1", short), 1);
    }

    #[test]
    fn later_increments_do_not_extend_window() {
        let store = MemoryCounters::new();
        let short = Duration::from_millis(40);
        let _ = store.incr_with_expiry("rate:u1", short);
        std::thread::sleep(Duration::from_millis(25));
        // Second increment inside the window must not refresh the expiry.
        let _ = store.incr_with_expiry("rate:u1", short);
        std::thread::sleep(Duration::from_millis(25));
        assert!(store.get("rate:u1").is_none());
    }

    #[test]
    fn decr_saturates_at_zero() {
        let store = MemoryCounters::new();
        let _ = store.incr_with_expiry("conns:u1", TTL);
        store.decr("conns:u1");
        store.decr("conns:u1");
        store.decr("conns:u1");
        assert_eq!(store.get("conns:u1"), Some(0));
    }

    #[test]
    fn flags_expire() {
        let store = MemoryCounters::new();
        store.set_flag("block:1.2.3.4", Duration::from_millis(20));
        assert!(store.exists("block:1.2.3.4"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!store.exists("block:1.2.3.4"));
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = MemoryCounters::new();
        let _ = store.incr_with_expiry("keep", TTL);
        store.set_flag("drop", Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.exists("keep"));
    }

    proptest! {
        // Counters can never go negative regardless of operation order.
        #[test]
        fn counter_never_negative(ops in proptest::collection::vec(0..3u8, 1..64)) {
            let store = MemoryCounters::new();
            for op in ops {
                match op {
                    0 => { let _ = store.incr_with_expiry("k", TTL); }
                    1 => store.decr("k"),
                    _ => store.delete("k"),
                }
                if let Some(count) = store.get("k") {
                    // u64 can't be negative; assert decr saturation didn't wrap.
                    prop_assert!(count < u64::MAX / 2);
                }
            }
        }
    }
}
