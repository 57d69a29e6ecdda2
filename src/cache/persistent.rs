//! Persistent Tier Module
//!
//! TTL semantics on top of a durable key-value store. Every store failure
//! is logged and degraded to a miss or a no-op.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CategoryRegistry, Clock, Ttl};
use crate::store::PersistentStore;

// == Persistent Cache ==
/// Durable tier with lazy expiry.
///
/// Expired entries are deleted when a read observes them; there is no
/// background sweep.
#[derive(Clone)]
pub struct PersistentCache {
    store: Arc<dyn PersistentStore>,
    registry: Arc<CategoryRegistry>,
    clock: Arc<dyn Clock>,
}

impl PersistentCache {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        registry: Arc<CategoryRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    // == Get ==
    /// Returns the value for `key` if present and not expired.
    ///
    /// An expired entry is removed from the store as a side effect.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.read_entry(key).await?;

        if entry.is_expired(self.clock.now_ms()) {
            debug!(key, "persistent entry expired");
            self.remove(key).await;
            return None;
        }

        decode(key, entry.data)
    }

    /// Returns the value for `key` ignoring its TTL, without evicting.
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.read_entry(key).await?;
        decode(key, entry.data)
    }

    // == Set ==
    /// Writes `data` under `key`.
    ///
    /// TTL resolves as `custom_ttl`, then the key's category TTL, then the
    /// registry default.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, custom_ttl: Option<Ttl>) {
        let ttl = custom_ttl.unwrap_or_else(|| self.registry.ttl_for(key));
        let entry = CacheEntry::new(data, self.clock.now_ms(), ttl);

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "failed to serialize cache entry");
                return;
            }
        };

        match self.store.set(key, &raw).await {
            Ok(()) => debug!(key, ttl = ttl.as_millis(), "persistent entry written"),
            Err(err) => warn!(key, error = %err, "failed to write cache entry"),
        }
    }

    // == Remove ==
    /// Deletes one entry.
    pub async fn remove(&self, key: &str) {
        if let Err(err) = self.store.remove(key).await {
            warn!(key, error = %err, "failed to remove cache entry");
        }
    }

    // == Clear All ==
    /// Deletes every entry owned by a registered category, user scoped
    /// variants included, in one batch. Returns the number of keys removed.
    pub async fn clear_all(&self) -> usize {
        let keys = match self.store.list_keys().await {
            Ok(keys) => keys
                .into_iter()
                .filter(|key| self.registry.owns(key))
                .collect::<Vec<_>>(),
            Err(err) => {
                warn!(error = %err, "failed to list keys, clearing category keys only");
                self.registry
                    .categories()
                    .iter()
                    .map(|c| c.key_prefix.clone())
                    .collect()
            }
        };

        self.remove_batch(keys).await.len()
    }

    // == Clear Matching ==
    /// Deletes every stored key matching `pred` in one batch.
    ///
    /// Returns the keys that were removed.
    pub async fn clear_matching(&self, pred: impl Fn(&str) -> bool) -> Vec<String> {
        let keys = match self.store.list_keys().await {
            Ok(keys) => keys.into_iter().filter(|key| pred(key)).collect(),
            Err(err) => {
                warn!(error = %err, "failed to list cache keys");
                return Vec::new();
            }
        };
        self.remove_batch(keys).await
    }

    /// Lists every stored key, empty on failure.
    pub async fn keys(&self) -> Vec<String> {
        self.store.list_keys().await.unwrap_or_else(|err| {
            warn!(error = %err, "failed to list cache keys");
            Vec::new()
        })
    }

    pub fn store(&self) -> &dyn PersistentStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Removes `keys` and returns the ones no longer in the store.
    ///
    /// A failed batch may still have removed some keys, so the store is
    /// listed again to find out which.
    async fn remove_batch(&self, keys: Vec<String>) -> Vec<String> {
        if keys.is_empty() {
            return keys;
        }
        let err = match self.store.multi_remove(&keys).await {
            Ok(()) => {
                debug!(count = keys.len(), "removed cache entries");
                return keys;
            }
            Err(err) => err,
        };

        match self.store.list_keys().await {
            Ok(left) => {
                let left: HashSet<String> = left.into_iter().collect();
                let removed: Vec<String> =
                    keys.into_iter().filter(|key| !left.contains(key)).collect();
                warn!(error = %err, removed = removed.len(), "batch removal partially failed");
                removed
            }
            Err(list_err) => {
                warn!(error = %err, list_error = %list_err, "batch removal failed");
                Vec::new()
            }
        }
    }

    async fn read_entry(&self, key: &str) -> Option<CacheEntry<Value>> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "failed to read cache entry");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(key, error = %err, "corrupt cache entry");
                None
            }
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "cached data has unexpected shape");
            None
        }
    }
}

impl std::fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache")
            .field("categories", &self.registry.categories().len())
            .finish()
    }
}
