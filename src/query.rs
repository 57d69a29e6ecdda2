//! Cache Query Module
//!
//! Consumer-facing handle that binds one key and one fetcher to an
//! [`OfflineCache`] and publishes [`QueryState`] snapshots through a
//! `tokio::sync::watch` channel.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::cache::{CacheResult, OfflineCache};

/// Reusable fetcher shared by every load of a query.
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Option<T>>> + Send + Sync>;

type SuccessCallback<T> = Arc<dyn Fn(&T, bool) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Wraps an async closure as a [`Fetcher`].
pub fn fetcher<T, F, Fut>(f: F) -> Fetcher<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

// == Query State ==
/// Snapshot published after every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub from_cache: bool,
    pub is_online: bool,
}

// == Query Options ==
pub struct QueryOptions<T> {
    /// When false the query never loads
    pub enabled: bool,
    /// Load through the fetcher on mount instead of reading the cache only
    pub refresh_on_mount: bool,
    /// Freshness hint for consumers; not enforced
    pub stale_time: Option<Duration>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_on_mount: true,
            stale_time: None,
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> Clone for QueryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            enabled: self.enabled,
            refresh_on_mount: self.refresh_on_mount,
            stale_time: self.stale_time,
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T> fmt::Debug for QueryOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("enabled", &self.enabled)
            .field("refresh_on_mount", &self.refresh_on_mount)
            .field("stale_time", &self.stale_time)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl<T> QueryOptions<T> {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn refresh_on_mount(mut self, refresh_on_mount: bool) -> Self {
        self.refresh_on_mount = refresh_on_mount;
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    /// Called with the data and its `from_cache` flag whenever a load yields data.
    pub fn on_success(mut self, callback: impl Fn(&T, bool) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Called with the message whenever a load reports an error.
    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

// == Cache Query ==
/// Live view of one cache key.
///
/// [`mount`](Self::mount) starts it; after [`unmount`](Self::unmount) the
/// results of loads still running are discarded, although the fetch
/// itself completes and still updates the cache.
pub struct CacheQuery<T> {
    cache: OfflineCache,
    key: String,
    fetcher: Fetcher<T>,
    options: QueryOptions<T>,
    state: watch::Sender<QueryState<T>>,
    mounted: AtomicBool,
}

impl<T> CacheQuery<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        cache: OfflineCache,
        key: impl Into<String>,
        fetcher: Fetcher<T>,
        options: QueryOptions<T>,
    ) -> Self {
        let initial = QueryState {
            data: None,
            loading: options.enabled,
            error: None,
            from_cache: false,
            is_online: cache.is_online(),
        };
        let (state, _) = watch::channel(initial);
        Self {
            cache,
            key: key.into(),
            fetcher,
            options,
            state,
            mounted: AtomicBool::new(false),
        }
    }

    // == Lifecycle ==
    /// Marks the query live and performs the initial load.
    pub async fn mount(&self) {
        self.mounted.store(true, Ordering::SeqCst);
        if !self.options.enabled {
            return;
        }

        if self.options.refresh_on_mount {
            self.load(false).await;
        } else {
            self.seed_from_cache().await;
        }
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    // == Actions ==
    /// Bypasses the cached value and fetches.
    pub async fn refresh(&self) {
        self.load(true).await;
    }

    /// Drops the key from both cache tiers, then fetches again.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&self.key).await;
        self.state.send_modify(|state| {
            state.data = None;
            state.from_cache = false;
        });
        self.load(true).await;
    }

    /// Writes `data` through to the cache and publishes it.
    pub async fn set_data(&self, data: T) {
        self.cache.set(&self.key, &data, None).await;
        let is_online = self.cache.is_online();
        self.state.send_modify(|state| {
            state.data = Some(data);
            state.loading = false;
            state.error = None;
            state.from_cache = false;
            state.is_online = is_online;
        });
    }

    // == Accessors ==
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Receives every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn stale_time(&self) -> Option<Duration> {
        self.options.stale_time
    }

    pub fn is_online(&self) -> bool {
        self.cache.is_online()
    }

    async fn load(&self, force_refresh: bool) {
        if !self.options.enabled {
            return;
        }

        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let fetcher = Arc::clone(&self.fetcher);
        let result = self
            .cache
            .get_with_fallback(&self.key, move || fetcher(), force_refresh)
            .await;

        if !self.is_mounted() {
            debug!(key = %self.key, "query unmounted, discarding result");
            return;
        }
        self.apply(result);
    }

    async fn seed_from_cache(&self) {
        let cached = self.cache.get::<T>(&self.key).await;
        if !self.is_mounted() {
            return;
        }

        let is_online = self.cache.is_online();
        self.state.send_modify(|state| {
            if let Some(data) = cached {
                state.data = Some(data);
                state.from_cache = true;
            }
            state.loading = false;
            state.is_online = is_online;
        });
    }

    fn apply(&self, result: CacheResult<T>) {
        if let (Some(data), Some(callback)) = (&result.data, &self.options.on_success) {
            callback(data, result.from_cache);
        }
        if let (Some(error), Some(callback)) = (&result.error, &self.options.on_error) {
            callback(error);
        }

        let is_online = self.cache.is_online();
        self.state.send_modify(|state| {
            if let Some(data) = result.data {
                state.data = Some(data);
                state.from_cache = result.from_cache;
            }
            state.error = result.error;
            state.loading = false;
            state.is_online = is_online;
        });
    }
}

impl<T> fmt::Debug for CacheQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheQuery")
            .field("key", &self.key)
            .field("options", &self.options)
            .field("mounted", &self.mounted.load(Ordering::SeqCst))
            .finish()
    }
}
