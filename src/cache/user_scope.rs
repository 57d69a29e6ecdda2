//! User Scope Module
//!
//! Derives per-user cache keys from shared base keys.

/// Namespaces `base_key` for `user_id` as `<base_key>_<user_id>`.
///
/// A missing or empty user id leaves the key unscoped.
pub fn user_key(base_key: &str, user_id: Option<&str>) -> String {
    match user_id {
        Some(user_id) if !user_id.is_empty() => format!("{base_key}_{user_id}"),
        _ => base_key.to_string(),
    }
}

/// True if `key` was namespaced for `user_id`.
///
/// Matches on the `_<user_id>` suffix, so user `4` does not match `_42`.
pub fn belongs_to_user(key: &str, user_id: &str) -> bool {
    !user_id.is_empty()
        && key
            .strip_suffix(user_id)
            .is_some_and(|rest| rest.ends_with('_'))
}
