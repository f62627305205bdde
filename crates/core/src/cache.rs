//! TTL response cache for GET requests
//!
//! Entries are immutable once written and are evicted lazily: a lookup that
//! finds an entry older than the TTL removes it and reports a miss. Partial
//! invalidation removes every key containing a given substring (used for
//! post-mutation cache busting), and `clear` empties the cache in one pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use beacon_domain::ApiEnvelope;
use parking_lot::RwLock;
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Entry stored in the cache
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: ApiEnvelope,
    stored_at: Instant,
}

/// Snapshot of cache activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

/// Thread-safe TTL cache keyed by canonical request signature
///
/// # Type Parameters
/// - `C`: Clock used to age entries (defaults to `SystemClock`; tests inject
///   a `MockClock` to exercise expiry without sleeping)
pub struct ResponseCache<C: Clock = SystemClock> {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: C,
    counters: Counters,
}

impl ResponseCache<SystemClock> {
    /// Create a cache with the given TTL using the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> ResponseCache<C> {
    /// Create a cache with a custom clock (useful for testing).
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
            counters: Counters::default(),
        }
    }

    /// Look up a fresh entry, lazily evicting it when its age reached the
    /// TTL.
    pub fn get(&self, key: &str) -> Option<ApiEnvelope> {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        match entries.get(key) {
            Some(entry) if now.duration_since(entry.stored_at) < self.ttl => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.payload.clone())
            }
            Some(_) => {
                // Stale: treat as absent and evict before the caller proceeds
                entries.remove(key);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key, "evicted stale cache entry");
                None
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a fresh entry under `key`, stamped with the current time.
    pub fn insert(&self, key: String, payload: ApiEnvelope) {
        let entry = CacheEntry { payload, stored_at: self.clock.now() };
        self.entries.write().insert(key, entry);
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Delete every entry whose key contains `pattern` as a substring.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        let removed = before - entries.len();

        if removed > 0 {
            self.counters.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(pattern, removed, "invalidated cache entries");
        }
        removed
    }

    /// Remove every entry in a single pass.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of the activity counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}
