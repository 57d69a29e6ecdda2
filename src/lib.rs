//! Offline Cache - an offline-aware two-tier cache
//!
//! A bounded memory tier in front of a durable key-value store, with
//! per-category TTLs, stale-while-revalidate reads, single-flight fetches
//! and network-aware fallbacks.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod query;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheResult, CacheSettings, OfflineCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use query::{CacheQuery, QueryOptions, QueryState};
