//! Success-gated adaptive cache.
//!
//! Entries are created only when an outcome report confirms a selector
//! actually worked, so the cache never amplifies a bad guess. A cached
//! selector keeps serving only while its observed success rate stays above
//! the serve threshold; pages change, and a selector that starts failing is
//! silently benched rather than returned forever.
//!
//! Expiry is lazy. Stale entries are dropped when looked up, not by a
//! background sweeper.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;

/// Minimum observed success rate for an entry to keep serving.
pub const SERVE_THRESHOLD: f64 = 0.7;

/// Days an unused entry lives before lazy expiry.
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Default entry capacity before LRU eviction.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A cached selector with its running success record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The candidate that succeeded for this query shape.
    pub candidate: Candidate,
    /// Reported successes since creation.
    pub success_count: u64,
    /// Reported failures since creation.
    pub failure_count: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last serve or outcome report, drives TTL and LRU.
    pub last_used: DateTime<Utc>,
}

impl CacheEntry {
    fn new(candidate: Candidate, now: DateTime<Utc>) -> Self {
        Self {
            candidate,
            success_count: 1,
            failure_count: 0,
            created_at: now,
            last_used: now,
        }
    }

    /// Fraction of reported outcomes that succeeded.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return 0.0;
        }
        self.success_count as f64 / total as f64
    }
}

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum entries before the least recently used one is evicted.
    pub capacity: usize,
    /// Idle lifetime before lazy expiry.
    pub ttl: Duration,
    /// Minimum success rate to serve an entry.
    pub serve_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: Duration::days(DEFAULT_TTL_DAYS),
            serve_threshold: SERVE_THRESHOLD,
        }
    }
}

/// Success-gated, lazily expiring selector cache keyed by query shape.
#[derive(Debug)]
pub struct AdaptiveCache {
    config: CacheConfig,
    entries: RwLock<BTreeMap<String, CacheEntry>>,
}

impl Default for AdaptiveCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl AdaptiveCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Restore a cache from persisted entries. Stale or over-capacity
    /// entries are trimmed on the way in.
    #[must_use]
    pub fn from_entries(config: CacheConfig, entries: BTreeMap<String, CacheEntry>) -> Self {
        let cache = Self::new(config);
        {
            let mut guard = cache.entries.write().unwrap_or_else(|e| e.into_inner());
            let now = Utc::now();
            let ttl = cache.config.ttl;
            *guard = entries
                .into_iter()
                .filter(|(_, e)| now - e.last_used <= ttl)
                .collect();
            Self::evict_over_capacity(&mut guard, cache.config.capacity);
        }
        cache
    }

    /// Look up the cached candidate for a query key.
    ///
    /// Returns `None` for unknown keys, expired entries (which are removed),
    /// and entries whose success rate has dropped to the serve threshold or
    /// below.
    pub fn get(&self, key: &str) -> Option<Candidate> {
        let now = Utc::now();
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = guard.get_mut(key)?;
        if now - entry.last_used > self.config.ttl {
            tracing::debug!(key, "cache entry expired");
            guard.remove(key);
            return None;
        }
        if entry.success_rate() <= self.config.serve_threshold {
            tracing::debug!(
                key,
                rate = entry.success_rate(),
                "cache entry below serve threshold"
            );
            return None;
        }
        entry.last_used = now;
        Some(entry.candidate.clone())
    }

    /// Record a confirmed success, creating the entry if needed.
    ///
    /// A success for a different selector than the cached one replaces the
    /// entry and resets its record.
    pub fn record_success(&self, key: &str, candidate: &Candidate) {
        let now = Utc::now();
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match guard.get_mut(key) {
            Some(entry) if entry.candidate.selector() == candidate.selector() => {
                entry.success_count += 1;
                entry.last_used = now;
            }
            _ => {
                guard.insert(key.to_string(), CacheEntry::new(candidate.clone(), now));
                Self::evict_over_capacity(&mut guard, self.config.capacity);
            }
        }
    }

    /// Record a failure against an existing entry. Unknown keys are ignored;
    /// failures never create entries.
    pub fn record_failure(&self, key: &str) {
        let now = Utc::now();
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = guard.get_mut(key) {
            entry.failure_count += 1;
            entry.last_used = now;
        }
    }

    /// Current entry count, including benched entries not yet expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current entries for persistence.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn evict_over_capacity(entries: &mut BTreeMap<String, CacheEntry>, capacity: usize) {
        while entries.len() > capacity {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            tracing::debug!(key = %oldest, "evicting least recently used cache entry");
            entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Tier;

    fn candidate(selector: &str) -> Candidate {
        Candidate::new(selector, 0.9, "test", Tier::Fast).unwrap()
    }

    mod gating {
        use super::*;

        #[test]
        fn test_miss_on_unknown_key() {
            let cache = AdaptiveCache::default();
            assert!(cache.get("k").is_none());
        }

        #[test]
        fn test_failure_never_creates_entry() {
            let cache = AdaptiveCache::default();
            cache.record_failure("k");
            assert!(cache.is_empty());
        }

        #[test]
        fn test_success_creates_and_serves() {
            let cache = AdaptiveCache::default();
            cache.record_success("k", &candidate("#login"));
            let hit = cache.get("k").unwrap();
            assert_eq!(hit.selector(), "#login");
        }

        #[test]
        fn test_two_successes_one_failure_still_serves() {
            // 2/3 is below the threshold, so add a third success first.
            let cache = AdaptiveCache::default();
            let c = candidate("#login");
            for _ in 0..7 {
                cache.record_success("k", &c);
            }
            cache.record_failure("k");
            // 7/8 = 0.875 > 0.7
            assert!(cache.get("k").is_some());
        }

        #[test]
        fn test_degraded_entry_benched() {
            let cache = AdaptiveCache::default();
            let c = candidate("#login");
            cache.record_success("k", &c);
            cache.record_failure("k");
            // 1/2 = 0.5 <= 0.7
            assert!(cache.get("k").is_none());
            // Entry is benched, not removed.
            assert_eq!(cache.len(), 1);
        }

        #[test]
        fn test_exact_threshold_does_not_serve() {
            let cache = AdaptiveCache::default();
            let c = candidate("#login");
            for _ in 0..7 {
                cache.record_success("k", &c);
            }
            for _ in 0..3 {
                cache.record_failure("k");
            }
            // 7/10 = 0.7, strictly-greater gate.
            assert!(cache.get("k").is_none());
        }

        #[test]
        fn test_new_selector_replaces_entry() {
            let cache = AdaptiveCache::default();
            cache.record_success("k", &candidate("#old"));
            cache.record_failure("k");
            cache.record_success("k", &candidate("#new"));
            let hit = cache.get("k").unwrap();
            assert_eq!(hit.selector(), "#new");
        }
    }

    mod expiry {
        use super::*;

        fn stale_entry(days_old: i64) -> CacheEntry {
            let then = Utc::now() - Duration::days(days_old);
            CacheEntry {
                candidate: candidate("#login"),
                success_count: 5,
                failure_count: 0,
                created_at: then,
                last_used: then,
            }
        }

        #[test]
        fn test_expired_entry_removed_on_get() {
            let cache = AdaptiveCache::default();
            {
                let mut guard = cache.entries.write().unwrap();
                guard.insert("k".to_string(), stale_entry(8));
            }
            assert!(cache.get("k").is_none());
            assert!(cache.is_empty());
        }

        #[test]
        fn test_fresh_entry_survives() {
            let cache = AdaptiveCache::default();
            {
                let mut guard = cache.entries.write().unwrap();
                guard.insert("k".to_string(), stale_entry(6));
            }
            assert!(cache.get("k").is_some());
        }

        #[test]
        fn test_restore_drops_stale_entries() {
            let mut entries = BTreeMap::new();
            entries.insert("old".to_string(), stale_entry(30));
            entries.insert("fresh".to_string(), stale_entry(1));
            let cache = AdaptiveCache::from_entries(CacheConfig::default(), entries);
            assert_eq!(cache.len(), 1);
            assert!(cache.get("fresh").is_some());
        }
    }

    mod eviction {
        use super::*;

        #[test]
        fn test_capacity_evicts_least_recently_used() {
            let config = CacheConfig {
                capacity: 2,
                ..CacheConfig::default()
            };
            let cache = AdaptiveCache::new(config);
            cache.record_success("a", &candidate("#a"));
            cache.record_success("b", &candidate("#b"));
            // Touch "a" so "b" is the oldest.
            assert!(cache.get("a").is_some());
            cache.record_success("c", &candidate("#c"));
            assert_eq!(cache.len(), 2);
            assert!(cache.get("b").is_none());
            assert!(cache.get("a").is_some());
            assert!(cache.get("c").is_some());
        }
    }

    mod persistence {
        use super::*;

        #[test]
        fn test_entries_round_trip() {
            let cache = AdaptiveCache::default();
            cache.record_success("k", &candidate("#login"));
            let restored = AdaptiveCache::from_entries(CacheConfig::default(), cache.entries());
            assert_eq!(restored.get("k").unwrap().selector(), "#login");
        }
    }
}
