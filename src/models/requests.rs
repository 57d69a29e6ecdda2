//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{Ttl, MAX_KEY_LENGTH, MAX_VALUE_SIZE};

/// Request body for PUT /cache/:key
///
/// `ttl` is in milliseconds, `-1` for permanent. When absent the key's
/// category TTL applies.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The value to store
    pub value: Value,
    /// Optional TTL override
    #[serde(default)]
    pub ttl: Option<Ttl>,
}

impl SetRequest {
    /// Validates the request against the target key.
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self, key: &str) -> Option<String> {
        if let Some(message) = validate_key(key) {
            return Some(message);
        }
        let size = self.value.to_string().len();
        if size > MAX_VALUE_SIZE {
            return Some(format!(
                "Value of {} bytes exceeds maximum size of {} bytes",
                size, MAX_VALUE_SIZE
            ));
        }
        None
    }
}

/// Checks a path supplied key.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}
