//! Cache Entry Module
//!
//! Defines the persisted entry layout and TTL policy values.

use serde::{Deserialize, Serialize};

/// Wire value marking an entry that never expires.
pub const PERMANENT_TTL: i64 = -1;

// == TTL ==
/// Time-to-live of a cache entry.
///
/// Serialized as milliseconds, with `-1` for [`Ttl::Permanent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Ttl {
    /// Never expires
    Permanent,
    /// Expires once older than this many milliseconds
    Millis(u64),
}

impl Ttl {
    /// Returns true when an entry of the given age has outlived this TTL.
    ///
    /// Expiry is strict: an entry exactly `ttl` old is still valid.
    pub fn is_expired(self, age_ms: u64) -> bool {
        match self {
            Ttl::Permanent => false,
            Ttl::Millis(ttl) => age_ms > ttl,
        }
    }

    /// TTL as the signed millisecond value used on the wire.
    pub fn as_millis(self) -> i64 {
        i64::from(self)
    }
}

impl From<i64> for Ttl {
    fn from(value: i64) -> Self {
        if value < 0 {
            Ttl::Permanent
        } else {
            Ttl::Millis(value as u64)
        }
    }
}

impl From<Ttl> for i64 {
    fn from(ttl: Ttl) -> Self {
        match ttl {
            Ttl::Permanent => PERMANENT_TTL,
            Ttl::Millis(ms) => i64::try_from(ms).unwrap_or(i64::MAX),
        }
    }
}

// == Cache Entry ==
/// A single persisted cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Write time (Unix milliseconds)
    pub timestamp: u64,
    /// Lifetime policy captured at write time
    pub ttl: Ttl,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry written at `now_ms`.
    pub fn new(data: T, now_ms: u64, ttl: Ttl) -> Self {
        Self {
            data,
            timestamp: now_ms,
            ttl,
        }
    }

    // == Age ==
    /// Milliseconds since the entry was written. Clock skew saturates to 0.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.ttl.is_expired(self.age_ms(now_ms))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_never_expires() {
        let entry = CacheEntry::new("v", 0, Ttl::Permanent);
        assert!(!entry.is_expired(u64::MAX));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new("v", 1_000, Ttl::Millis(500));
        assert!(!entry.is_expired(1_500), "exactly ttl old is still valid");
        assert!(entry.is_expired(1_501));
    }

    #[test]
    fn test_age_saturates_on_clock_skew() {
        let entry = CacheEntry::new("v", 5_000, Ttl::Millis(10));
        assert_eq!(entry.age_ms(1_000), 0);
        assert!(!entry.is_expired(1_000));
    }

    #[test]
    fn test_wire_format() {
        let entry = CacheEntry::new(vec![1, 2], 42, Ttl::Permanent);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["ttl"], -1);
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["data"], serde_json::json!([1, 2]));

        let parsed: CacheEntry<String> =
            serde_json::from_str(r#"{"data":"x","timestamp":7,"ttl":1000}"#).unwrap();
        assert_eq!(parsed.ttl, Ttl::Millis(1_000));
    }

    #[test]
    fn test_negative_ttl_is_permanent() {
        assert_eq!(Ttl::from(-5), Ttl::Permanent);
        assert_eq!(Ttl::Permanent.as_millis(), PERMANENT_TTL);
    }
}
