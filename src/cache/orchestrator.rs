//! Cache Orchestrator Module
//!
//! The offline-aware two-tier cache service. Decides between cache hits,
//! background refreshes, synchronous fetches and offline fallbacks.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::inflight::{FetchOutcome, Fetched, InFlight, SharedFetch};
use crate::cache::{
    belongs_to_user, user_key, CategoryRegistry, Clock, MemoryCache, PersistentCache,
    StatsReport, StatsReporter, SystemClock, Ttl,
};
use crate::config::Config;
use crate::error::{CacheError, Result, OFFLINE_NO_DATA};
use crate::network::{ConnectivityProbe, NetworkMonitor};
use crate::store::PersistentStore;

// == Cache Result ==
/// Outcome of [`OfflineCache::get_with_fallback`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheResult<T> {
    /// Best available data, None if nothing could be produced
    pub data: Option<T>,
    /// Data was served from the cache rather than a fresh fetch
    pub from_cache: bool,
    /// The device was offline when the call was made
    pub offline: bool,
    /// Why fresh data could not be obtained
    pub error: Option<String>,
}

impl<T> CacheResult<T> {
    fn fresh(data: Option<T>) -> Self {
        Self {
            data,
            from_cache: false,
            offline: false,
            error: None,
        }
    }

    fn cached(data: T) -> Self {
        Self {
            data: Some(data),
            from_cache: true,
            offline: false,
            error: None,
        }
    }

    fn offline(data: Option<T>) -> Self {
        let error = data.is_none().then(|| OFFLINE_NO_DATA.to_string());
        Self {
            data,
            from_cache: true,
            offline: true,
            error,
        }
    }

    fn failed(data: Option<T>, error: String) -> Self {
        Self {
            from_cache: data.is_some(),
            data,
            offline: false,
            error: Some(error),
        }
    }
}

// == Cache Settings ==
/// Construction parameters for [`OfflineCache`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Category table used for TTL resolution and bulk clearing
    pub registry: CategoryRegistry,
    /// Memory tier capacity
    pub max_memory_entries: usize,
    /// Connectivity poll interval, None for events only
    pub poll_interval: Option<Duration>,
    /// Time source for entry timestamps
    pub clock: Arc<dyn Clock>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            registry: CategoryRegistry::builtin(config.default_ttl_ms),
            max_memory_entries: config.max_memory_entries,
            poll_interval: config.poll_interval(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_registry(mut self, registry: CategoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_max_memory_entries(mut self, max_memory_entries: usize) -> Self {
        self.max_memory_entries = max_memory_entries;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Option<Duration>) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

struct Inner {
    persistent: PersistentCache,
    memory: Mutex<MemoryCache>,
    network: NetworkMonitor,
    inflight: InFlight,
}

// == Offline Cache ==
/// Two-tier cache: a bounded memory tier in front of a durable tier, both
/// governed by category TTLs and network awareness.
///
/// Cheap to clone; clones share state. Call [`initialize`](Self::initialize)
/// before use and [`cleanup`](Self::cleanup) when done.
#[derive(Clone)]
pub struct OfflineCache {
    inner: Arc<Inner>,
}

impl OfflineCache {
    // == Constructor ==
    pub fn new(
        store: Arc<dyn PersistentStore>,
        probe: Arc<dyn ConnectivityProbe>,
        settings: CacheSettings,
    ) -> Self {
        let registry = Arc::new(settings.registry);
        let inner = Inner {
            persistent: PersistentCache::new(store, registry, settings.clock),
            memory: Mutex::new(MemoryCache::new(settings.max_memory_entries)),
            network: NetworkMonitor::new(probe, settings.poll_interval),
            inflight: InFlight::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates a cache from configuration.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn PersistentStore>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self::new(store, probe, CacheSettings::from_config(config))
    }

    // == Lifecycle ==
    /// Probes connectivity and starts following network changes.
    pub async fn initialize(&self) {
        self.inner.network.initialize().await;
        info!(online = self.is_online(), "offline cache initialized");
    }

    /// Stops following network changes.
    pub fn cleanup(&self) {
        self.inner.network.cleanup();
        info!("offline cache cleaned up");
    }

    pub fn is_online(&self) -> bool {
        self.inner.network.is_online()
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.inner.network
    }

    pub fn registry(&self) -> &CategoryRegistry {
        self.inner.persistent.registry()
    }

    // == Get With Fallback ==
    /// Stale-while-revalidate read.
    ///
    /// - Offline: serves the cached value (TTL still applies) and never
    ///   calls `fetcher`.
    /// - Online with a valid cached value and no `force_refresh`: returns
    ///   it at once and refreshes in the background. Background failures
    ///   are logged and dropped.
    /// - Otherwise: awaits `fetcher`. On failure, falls back to the last
    ///   cached value, stale or not, alongside the error.
    ///
    /// `Ok(None)` from `fetcher` means "nothing new" and never overwrites
    /// the cache. Concurrent fetches of one key are coalesced.
    pub async fn get_with_fallback<T, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        force_refresh: bool,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        if !self.is_online() {
            let cached = self.inner.persistent.get::<T>(key).await;
            debug!(key, hit = cached.is_some(), "offline read");
            return CacheResult::offline(cached);
        }

        if !force_refresh {
            if let Some(cached) = self.inner.persistent.get::<T>(key).await {
                debug!(key, "cache hit, refreshing in background");
                self.refresh_in_background(key, fetcher);
                return CacheResult::cached(cached);
            }
        }

        let (fetch, _) = self.start_fetch(key, fetcher);
        match fetch.await {
            Ok(Some(fetched)) => match serde_json::from_value::<T>(fetched.value) {
                Ok(data) => CacheResult::fresh(Some(data)),
                Err(err) => self.fallback(key, err.to_string()).await,
            },
            Ok(None) => match self.inner.persistent.get_stale::<T>(key).await {
                Some(cached) => CacheResult::cached(cached),
                None => CacheResult::fresh(None),
            },
            Err(message) => self.fallback(key, message).await,
        }
    }

    // == Get Or Fetch For User ==
    /// Memory tier, then persistent tier, then `fetcher`, populating both
    /// tiers on the way back. No background refresh.
    ///
    /// Offline with both tiers empty yields [`CacheError::OfflineUnavailable`]
    /// without calling `fetcher`.
    pub async fn get_or_fetch_for_user<T, F, Fut>(
        &self,
        key: &str,
        user_id: &str,
        fetcher: F,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        if let Some(data) = self.get_from_memory::<T>(key, Some(user_id)) {
            return Ok(Some(data));
        }

        let scoped = user_key(key, Some(user_id));
        if let Some(data) = self.inner.persistent.get::<T>(&scoped).await {
            self.set_in_memory(key, &data, Some(user_id));
            return Ok(Some(data));
        }

        if !self.is_online() {
            return Err(CacheError::offline());
        }

        let (fetch, _) = self.start_fetch(&scoped, fetcher);
        match fetch.await {
            Ok(Some(fetched)) => {
                let data = serde_json::from_value::<T>(fetched.value.clone())?;
                if fetched.committed {
                    let now = self.inner.persistent.clock().now_ms();
                    self.memory().set(scoped, fetched.value, now);
                }
                Ok(Some(data))
            }
            Ok(None) => Ok(None),
            Err(message) => Err(CacheError::Fetch(message)),
        }
    }

    // == Persistent Tier ==
    /// Reads a valid value from the persistent tier.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner.persistent.get(key).await
    }

    /// Writes to the persistent tier. TTL defaults to the key's category.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, custom_ttl: Option<Ttl>) {
        self.inner.persistent.set(key, data, custom_ttl).await;
    }

    /// Deletes a persistent entry and discards in-flight fetches of it.
    pub async fn remove(&self, key: &str) {
        self.inner.inflight.invalidate(key);
        self.inner.persistent.remove(key).await;
    }

    /// Deletes `key` from both tiers and discards in-flight fetches of it.
    pub async fn invalidate(&self, key: &str) {
        self.inner.inflight.invalidate(key);
        self.memory().remove(key);
        self.inner.persistent.remove(key).await;
        debug!(key, "invalidated");
    }

    // == User Scope ==
    pub async fn get_for_user<T: DeserializeOwned>(&self, key: &str, user_id: &str) -> Option<T> {
        self.get(&user_key(key, Some(user_id))).await
    }

    pub async fn set_for_user<T: Serialize + ?Sized>(
        &self,
        key: &str,
        user_id: &str,
        data: &T,
        custom_ttl: Option<Ttl>,
    ) {
        self.set(&user_key(key, Some(user_id)), data, custom_ttl)
            .await;
    }

    /// Deletes one user scoped key from both tiers.
    pub async fn remove_for_user(&self, key: &str, user_id: &str) {
        self.invalidate(&user_key(key, Some(user_id))).await;
    }

    // == Memory Tier ==
    /// Memory tier lookup. Never performs I/O.
    pub fn get_from_memory<T: DeserializeOwned>(&self, key: &str, user_id: Option<&str>) -> Option<T> {
        let scoped = user_key(key, user_id);
        let ttl = self.registry().ttl_for(&scoped);
        let now = self.inner.persistent.clock().now_ms();
        let value = self.memory().get(&scoped, now, ttl)?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(key = %scoped, error = %err, "memory entry has unexpected shape");
                None
            }
        }
    }

    /// Stores a value in the memory tier, evicting the oldest at capacity.
    pub fn set_in_memory<T: Serialize + ?Sized>(&self, key: &str, data: &T, user_id: Option<&str>) {
        let scoped = user_key(key, user_id);
        match serde_json::to_value(data) {
            Ok(value) => {
                let now = self.inner.persistent.clock().now_ms();
                self.memory().set(scoped, value, now);
            }
            Err(err) => warn!(key = %scoped, error = %err, "failed to serialize memory entry"),
        }
    }

    pub fn invalidate_memory(&self, key: &str, user_id: Option<&str>) {
        self.memory().remove(&user_key(key, user_id));
    }

    // == Bulk Clearing ==
    /// Clears both tiers. Returns the number of persistent entries removed.
    pub async fn clear_all(&self) -> usize {
        self.inner.inflight.invalidate_all();
        self.memory().clear();
        let removed = self.inner.persistent.clear_all().await;
        info!(removed, "cleared all cache entries");
        removed
    }

    /// Purges every key scoped to `user_id` from both tiers.
    ///
    /// The tiers are cleared one after the other; a concurrent reader can
    /// observe the memory tier cleared before the persistent tier.
    /// Returns the number of persistent entries removed.
    pub async fn clear_user_cache(&self, user_id: &str) -> usize {
        let owned = |key: &str| belongs_to_user(key, user_id);

        self.inner.inflight.invalidate_where(owned);
        let mut purged_memory = self.memory().remove_where(owned);
        let removed = self.inner.persistent.clear_matching(owned).await;

        // Fetches started while the store was being purged
        self.inner.inflight.invalidate_where(owned);
        purged_memory += self.memory().remove_where(owned);

        info!(user_id, memory = purged_memory, persistent = removed.len(), "cleared user cache");
        removed.len()
    }

    // == Stats ==
    /// Raw diagnostics across registered categories and the memory tier.
    ///
    /// Never evicts, so expired entries still on disk are reported.
    pub async fn stats(&self) -> StatsReport {
        let memory = self.memory().stats();
        let persistent = &self.inner.persistent;
        StatsReporter::new(persistent.store(), persistent.registry(), persistent.clock())
            .report(memory)
            .await
    }

    fn memory(&self) -> MutexGuard<'_, MemoryCache> {
        self.inner.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh_in_background<T, F, Fut>(&self, key: &str, fetcher: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        let (_, started) = self.start_fetch(key, fetcher);
        if !started {
            debug!(key, "refresh already in flight");
        }
    }

    async fn fallback<T: DeserializeOwned>(&self, key: &str, message: String) -> CacheResult<T> {
        let cached = self.inner.persistent.get_stale::<T>(key).await;
        debug!(key, has_fallback = cached.is_some(), "serving fallback after failed fetch");
        CacheResult::failed(cached, message)
    }

    /// Joins or spawns the fetch for `key`.
    ///
    /// The fetch runs as its own task, so it completes and writes the
    /// persistent tier even if every caller stops waiting.
    fn start_fetch<T, F, Fut>(&self, key: &str, fetcher: F) -> (SharedFetch, bool)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        self.inner.inflight.join_or_start(key, |id| {
            let inner = Arc::clone(&self.inner);
            let key = key.to_string();
            let task = tokio::spawn(async move {
                let outcome = run_fetch(&inner, &key, id, fetcher).await;
                inner.inflight.finish(&key, id);
                outcome
            });
            task.map(|joined| joined.unwrap_or_else(|err| Err(format!("fetch task failed: {err}"))))
                .boxed()
                .shared()
        })
    }
}

async fn run_fetch<T, F, Fut>(inner: &Inner, key: &str, id: u64, fetcher: F) -> FetchOutcome
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    match fetcher().await {
        Ok(Some(data)) => {
            let value = serde_json::to_value(&data).map_err(|err| err.to_string())?;
            let committed = inner.inflight.is_current(key, id);
            if committed {
                inner.persistent.set(key, &value, None).await;
            } else {
                debug!(key, "key invalidated during fetch, result not cached");
            }
            Ok(Some(Fetched { value, committed }))
        }
        Ok(None) => {
            debug!(key, "fetcher returned no data");
            Ok(None)
        }
        Err(err) => {
            warn!(key, error = %err, "fetch failed");
            Err(err.to_string())
        }
    }
}

impl std::fmt::Debug for OfflineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineCache")
            .field("online", &self.is_online())
            .field("memory_entries", &self.memory().len())
            .field("fetches_in_flight", &self.inner.inflight.len())
            .finish()
    }
}
