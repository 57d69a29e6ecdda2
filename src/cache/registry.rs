//! Category Registry Module
//!
//! Static table mapping cache categories to their storage key and TTL.

use serde::Serialize;

use crate::cache::Ttl;

const MINUTE: i64 = 60 * 1000;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Builtin categories as `(name, key_prefix, ttl_ms)`, `-1` meaning permanent.
const BUILTIN_CATEGORIES: &[(&str, &str, i64)] = &[
    // Generic
    ("user_profile", "user_profile", DAY),
    ("app_settings", "app_settings", -1),
    ("notifications", "notifications", 5 * MINUTE),
    // Trading
    ("portfolio", "portfolio", 5 * MINUTE),
    ("trades", "trades", 5 * MINUTE),
    ("market_data", "market_data", MINUTE),
    ("watchlist", "watchlist", HOUR),
    // Forum
    ("forum_feed", "forum_feed", 10 * MINUTE),
    ("forum_categories", "forum_categories", HOUR),
    // Gamification
    ("achievements", "achievements", 30 * MINUTE),
    ("leaderboard", "leaderboard", 15 * MINUTE),
    // Chatbot
    ("chatbot_history", "chatbot_history", 7 * DAY),
    ("chatbot_suggestions", "chatbot_suggestions", HOUR),
    // Rituals
    ("daily_ritual", "daily_ritual", 12 * HOUR),
    ("ritual_history", "ritual_history", DAY),
    // Streaks
    ("streak_data", "streak_data", HOUR),
    ("streak_rewards", "streak_rewards", DAY),
];

/// Fallback TTL for keys that belong to no category.
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

// == Cache Category ==
/// One registered cache category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheCategory {
    /// Human readable name
    pub name: String,
    /// Storage key; user scoped entries append `_<userId>`
    pub key_prefix: String,
    /// Default lifetime of entries in this category
    pub ttl: Ttl,
}

impl CacheCategory {
    pub fn new(name: impl Into<String>, key_prefix: impl Into<String>, ttl: Ttl) -> Self {
        Self {
            name: name.into(),
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    /// True if `key` is this category's key or a namespaced variant of it.
    pub fn matches(&self, key: &str) -> bool {
        match key.strip_prefix(self.key_prefix.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('_'),
            None => false,
        }
    }
}

// == Category Registry ==
/// Lookup table from cache key to category policy.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<CacheCategory>,
    default_ttl: Ttl,
}

impl CategoryRegistry {
    /// Creates an empty registry where every key uses `default_ttl`.
    pub fn empty(default_ttl: Ttl) -> Self {
        Self {
            categories: Vec::new(),
            default_ttl,
        }
    }

    /// Creates the builtin registry with the given fallback TTL.
    pub fn builtin(default_ttl_ms: u64) -> Self {
        let categories = BUILTIN_CATEGORIES
            .iter()
            .map(|&(name, prefix, ttl)| CacheCategory::new(name, prefix, Ttl::from(ttl)))
            .collect();
        Self {
            categories,
            default_ttl: Ttl::Millis(default_ttl_ms),
        }
    }

    /// Registers a category, replacing any with the same key prefix.
    pub fn with_category(
        mut self,
        name: impl Into<String>,
        key_prefix: impl Into<String>,
        ttl: Ttl,
    ) -> Self {
        let category = CacheCategory::new(name, key_prefix, ttl);
        self.categories
            .retain(|c| c.key_prefix != category.key_prefix);
        self.categories.push(category);
        self
    }

    /// Finds the category owning `key`.
    ///
    /// An exact prefix match wins; otherwise the longest prefix followed
    /// by `_` is chosen, so `forum_feed_42` resolves to `forum_feed`
    /// rather than to a shorter `forum` category.
    pub fn resolve(&self, key: &str) -> Option<&CacheCategory> {
        self.categories
            .iter()
            .filter(|c| c.matches(key))
            .max_by_key(|c| c.key_prefix.len())
    }

    /// TTL that applies to `key`, falling back to the default TTL.
    pub fn ttl_for(&self, key: &str) -> Ttl {
        self.resolve(key).map_or(self.default_ttl, |c| c.ttl)
    }

    /// True if `key` belongs to a registered category.
    pub fn owns(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    pub fn categories(&self) -> &[CacheCategory] {
        &self.categories
    }

    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::builtin(DEFAULT_TTL_MS)
    }
}
