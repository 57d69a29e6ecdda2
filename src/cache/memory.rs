//! Memory Tier Module
//!
//! Bounded process-local map in front of the persistent tier. Never
//! performs I/O.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::cache::{InsertionOrder, MemoryStats, Ttl};

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Value,
    inserted_at: u64,
}

// == Memory Cache ==
/// Bounded key -> (data, insertion time) map.
///
/// Entries carry no TTL of their own; callers pass the category TTL on
/// every read. When a new key is inserted at capacity, the entry with the
/// oldest insertion is evicted first.
#[derive(Debug)]
pub struct MemoryCache {
    entries: HashMap<String, MemoryEntry>,
    order: InsertionOrder,
    stats: MemoryStats,
    max_entries: usize,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates an empty memory tier holding at most `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            stats: MemoryStats::new(),
            max_entries,
        }
    }

    // == Get ==
    /// Returns the value for `key` unless it is older than `ttl`.
    ///
    /// Expired entries are removed. Every call counts as a hit or a miss.
    pub fn get(&mut self, key: &str, now_ms: u64, ttl: Ttl) -> Option<Value> {
        let Some(entry) = self.entries.get(key) else {
            self.stats.record_miss();
            return None;
        };

        if ttl.is_expired(now_ms.saturating_sub(entry.inserted_at)) {
            debug!(key, "memory entry expired");
            self.remove(key);
            self.stats.record_miss();
            return None;
        }

        let data = entry.data.clone();
        self.stats.record_hit();
        Some(data)
    }

    // == Set ==
    /// Stores `data` under `key`, returning the key evicted to make room.
    ///
    /// Overwriting an existing key never evicts; it refreshes the
    /// insertion time instead.
    pub fn set(&mut self, key: String, data: Value, now_ms: u64) -> Option<String> {
        if self.max_entries == 0 {
            return None;
        }

        let mut evicted = None;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            if let Some(oldest) = self.order.evict_oldest() {
                self.entries.remove(&oldest);
                self.stats.record_eviction();
                debug!(key = %oldest, "evicted oldest memory entry");
                evicted = Some(oldest);
            }
        }

        self.order.touch(&key);
        self.entries.insert(
            key,
            MemoryEntry {
                data,
                inserted_at: now_ms,
            },
        );
        self.stats.set_entries(self.entries.len());
        evicted
    }

    // == Remove ==
    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.remove(key);
            self.stats.set_entries(self.entries.len());
        }
        removed
    }

    /// Removes every key matching `pred`, returning how many were removed.
    pub fn remove_where(&mut self, pred: impl Fn(&str) -> bool) -> usize {
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pred(key))
            .cloned()
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats.set_entries(0);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> MemoryStats {
        let mut stats = self.stats.clone();
        stats.set_entries(self.entries.len());
        stats
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Ttl = Ttl::Millis(1_000);

    #[test]
    fn test_set_and_get() {
        let mut cache = MemoryCache::new(10);
        cache.set("k".into(), json!("v"), 0);

        assert_eq!(cache.get("k", 10, TTL), Some(json!("v")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_expired_removes_entry() {
        let mut cache = MemoryCache::new(10);
        cache.set("k".into(), json!(1), 0);

        assert_eq!(cache.get("k", 1_001, TTL), None);
        assert!(!cache.contains("k"));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_permanent_entries_never_expire() {
        let mut cache = MemoryCache::new(10);
        cache.set("k".into(), json!(1), 0);
        assert!(cache.get("k", u64::MAX, Ttl::Permanent).is_some());
    }

    #[test]
    fn test_evicts_oldest_insertion() {
        let mut cache = MemoryCache::new(2);
        cache.set("a".into(), json!("a"), 1);
        cache.set("b".into(), json!("b"), 2);
        let evicted = cache.set("c".into(), json!("c"), 3);

        assert_eq!(evicted.as_deref(), Some("a"));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut cache = MemoryCache::new(2);
        cache.set("a".into(), json!(1), 1);
        cache.set("b".into(), json!(2), 2);
        assert_eq!(cache.set("a".into(), json!(3), 3), None);

        // `a` was reinserted last, so `b` is now oldest
        assert_eq!(cache.set("c".into(), json!(4), 4).as_deref(), Some("b"));
        assert_eq!(cache.get("a", 4, TTL), Some(json!(3)));
    }

    #[test]
    fn test_reads_do_not_change_eviction_order() {
        let mut cache = MemoryCache::new(2);
        cache.set("a".into(), json!(1), 1);
        cache.set("b".into(), json!(2), 2);
        cache.get("a", 3, TTL);

        assert_eq!(cache.set("c".into(), json!(3), 4).as_deref(), Some("a"));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = MemoryCache::new(0);
        cache.set("a".into(), json!(1), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_where() {
        let mut cache = MemoryCache::new(10);
        cache.set("feed_u1".into(), json!(1), 0);
        cache.set("feed_u2".into(), json!(2), 0);
        cache.set("profile_u1".into(), json!(3), 0);

        let removed = cache.remove_where(|k| k.ends_with("_u1"));
        assert_eq!(removed, 2);
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["feed_u2"]);
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let mut cache = MemoryCache::new(10);
        cache.set("k".into(), json!(1), 0);
        cache.get("k", 0, TTL);
        cache.get("missing", 0, TTL);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}
