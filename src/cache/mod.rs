//! Cache Module
//!
//! Two-tier caching: a bounded memory tier in front of a durable tier, with
//! per-category TTLs and network-aware refresh.

mod clock;
mod entry;
mod inflight;
mod lru;
mod memory;
mod orchestrator;
mod persistent;
mod registry;
mod stats;
mod user_scope;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Ttl, PERMANENT_TTL};
pub use lru::InsertionOrder;
pub use memory::MemoryCache;
pub use orchestrator::{CacheResult, CacheSettings, OfflineCache};
pub use persistent::PersistentCache;
pub use registry::{CacheCategory, CategoryRegistry, DEFAULT_TTL_MS};
pub use stats::{CategoryStats, MemoryStats, StatsReport, StatsReporter};
pub use user_scope::{belongs_to_user, user_key};

// == Public Constants ==
/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum accepted serialized value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
