//! Persistent Store Module
//!
//! Durable key-value collaborators behind the persistent tier.
//!
//! # Backends
//! - `InMemoryStore`: process-local map, used by tests and embedders
//! - `FileStore`: one file per key under a directory

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::InMemoryStore;

/// Convenience Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Persistent Store ==
/// Durable string key-value store.
///
/// Every call is a suspension point. Implementations report failures
/// through [`StoreError`]; the cache decides how to degrade.
#[async_trait]
pub trait PersistentStore: Send + Sync + 'static {
    /// Reads the raw value for `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Deletes `key`. Absent keys are not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Deletes every key in `keys` in one batch.
    async fn multi_remove(&self, keys: &[String]) -> StoreResult<()>;

    /// Lists every stored key.
    async fn list_keys(&self) -> StoreResult<Vec<String>>;
}
