//! Cache Statistics Module
//!
//! Memory tier counters and the read-only persistent tier report.

use serde::de::IgnoredAny;
use serde::Serialize;
use tracing::warn;

use crate::cache::{CacheEntry, CategoryRegistry, Clock, Ttl};
use crate::store::PersistentStore;

// == Memory Stats ==
/// Memory tier performance counters.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MemoryStats {
    /// Number of successful memory lookups
    pub hits: u64,
    /// Number of failed memory lookups (absent or expired)
    pub misses: u64,
    /// Number of entries evicted at capacity
    pub evictions: u64,
    /// Current number of entries in the memory tier
    pub entries: usize,
}

impl MemoryStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn set_entries(&mut self, count: usize) {
        self.entries = count;
    }
}

// == Category Stats ==
/// Raw on-disk state of one category's entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryStats {
    /// Category name
    pub name: String,
    /// Storage key that was inspected
    pub key: String,
    /// Bytes of the serialized entry
    pub size: usize,
    /// Milliseconds since the entry was written, None if unreadable
    pub age: Option<u64>,
    /// TTL recorded in the entry, None if unreadable
    pub ttl: Option<Ttl>,
    /// Whether the entry has outlived its TTL but is still stored
    pub is_expired: bool,
}

// == Stats Report ==
/// Diagnostics snapshot across both tiers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsReport {
    /// One row per category with a persisted entry
    pub categories: Vec<CategoryStats>,
    /// Sum of all category entry sizes in bytes
    pub total_size: usize,
    /// Oldest entry write time (Unix milliseconds)
    pub oldest_cache: Option<u64>,
    /// Newest entry write time (Unix milliseconds)
    pub newest_cache: Option<u64>,
    /// Memory tier counters
    pub memory: MemoryStats,
    /// Memory tier hit rate
    pub hit_rate: f64,
}

// == Stats Reporter ==
/// Reads every registered category's raw entry without evicting anything.
pub struct StatsReporter<'a> {
    store: &'a dyn PersistentStore,
    registry: &'a CategoryRegistry,
    clock: &'a dyn Clock,
}

impl<'a> StatsReporter<'a> {
    pub fn new(
        store: &'a dyn PersistentStore,
        registry: &'a CategoryRegistry,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Builds the report. Expired entries are reported, never removed.
    pub async fn report(&self, memory: MemoryStats) -> StatsReport {
        let now = self.clock.now_ms();
        let mut categories = Vec::new();
        let mut oldest_cache: Option<u64> = None;
        let mut newest_cache: Option<u64> = None;

        for category in self.registry.categories() {
            let raw = match self.store.get(&category.key_prefix).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(err) => {
                    warn!(key = %category.key_prefix, error = %err, "stats read failed");
                    continue;
                }
            };

            let parsed = serde_json::from_str::<CacheEntry<IgnoredAny>>(&raw).ok();
            let row = match parsed {
                Some(entry) => {
                    oldest_cache = Some(oldest_cache.map_or(entry.timestamp, |t| t.min(entry.timestamp)));
                    newest_cache = Some(newest_cache.map_or(entry.timestamp, |t| t.max(entry.timestamp)));
                    CategoryStats {
                        name: category.name.clone(),
                        key: category.key_prefix.clone(),
                        size: raw.len(),
                        age: Some(entry.age_ms(now)),
                        ttl: Some(entry.ttl),
                        is_expired: entry.is_expired(now),
                    }
                }
                None => CategoryStats {
                    name: category.name.clone(),
                    key: category.key_prefix.clone(),
                    size: raw.len(),
                    age: None,
                    ttl: None,
                    is_expired: false,
                },
            };
            categories.push(row);
        }

        let total_size = categories.iter().map(|c| c.size).sum();
        let hit_rate = memory.hit_rate();
        StatsReport {
            categories,
            total_size,
            oldest_cache,
            newest_cache,
            memory,
            hit_rate,
        }
    }
}
