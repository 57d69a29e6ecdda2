//! In-flight Fetch Registry
//!
//! Coalesces concurrent fetches of one key and lets an invalidation mark a
//! running fetch stale, so its result is returned but never written back.
//! Only keys with a fetch running are tracked.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, Shared};
use serde_json::Value;

// == Fetch Outcome ==
/// Data produced by a completed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub value: Value,
    /// The value was written to the persistent tier
    pub committed: bool,
}

/// Result of a fetch: fresh data, "nothing new", or the error message.
pub type FetchOutcome = std::result::Result<Option<Fetched>, String>;

/// A fetch that any number of callers can await.
pub type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

struct Registration {
    id: u64,
    fetch: SharedFetch,
    invalidated: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    fetches: HashMap<String, Registration>,
}

// == In-flight Registry ==
#[derive(Default)]
pub struct InFlight {
    state: Mutex<State>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while fetch `id` for `key` is registered and not invalidated.
    pub fn is_current(&self, key: &str, id: u64) -> bool {
        self.lock()
            .fetches
            .get(key)
            .is_some_and(|reg| reg.id == id && !reg.invalidated)
    }

    /// Marks the running fetch of `key`, if any, as stale.
    pub fn invalidate(&self, key: &str) {
        if let Some(reg) = self.lock().fetches.get_mut(key) {
            reg.invalidated = true;
        }
    }

    /// Marks every running fetch whose key matches `pred` as stale.
    pub fn invalidate_where(&self, pred: impl Fn(&str) -> bool) {
        for (key, reg) in self.lock().fetches.iter_mut() {
            if pred(key) {
                reg.invalidated = true;
            }
        }
    }

    /// Marks every running fetch as stale.
    pub fn invalidate_all(&self) {
        self.invalidate_where(|_| true);
    }

    /// Number of fetches currently registered.
    pub fn len(&self) -> usize {
        self.lock().fetches.len()
    }

    /// Joins the running fetch for `key`, or starts one with `start`.
    ///
    /// An invalidated fetch is never joined; a new one replaces it.
    /// `start` receives the registration id and runs under the registry
    /// lock, so it must not block. Returns the shared fetch and whether
    /// this call started it.
    pub fn join_or_start(
        &self,
        key: &str,
        start: impl FnOnce(u64) -> SharedFetch,
    ) -> (SharedFetch, bool) {
        let mut state = self.lock();
        if let Some(reg) = state.fetches.get(key) {
            if !reg.invalidated {
                return (reg.fetch.clone(), false);
            }
        }

        state.next_id += 1;
        let id = state.next_id;
        let fetch = start(id);
        state.fetches.insert(
            key.to_string(),
            Registration {
                id,
                fetch: fetch.clone(),
                invalidated: false,
            },
        );
        (fetch, true)
    }

    /// Unregisters the fetch `id` for `key` once it has completed.
    pub fn finish(&self, key: &str, id: u64) {
        let mut state = self.lock();
        if state.fetches.get(key).is_some_and(|reg| reg.id == id) {
            state.fetches.remove(key);
        }
    }
}
