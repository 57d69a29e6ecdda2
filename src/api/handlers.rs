//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{OfflineCache, StatsReport};
use crate::error::{CacheError, Result};
use crate::models::{
    validate_key, ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest,
    SetResponse,
};

/// Application state shared across all handlers.
///
/// `OfflineCache` is internally shared, so cloning the state is cheap.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: OfflineCache,
}

impl AppState {
    pub fn new(cache: OfflineCache) -> Self {
        Self { cache }
    }
}

/// Handler for GET /cache/:key
///
/// Returns the persisted value if present and not expired.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    if let Some(message) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(message));
    }

    match state.cache.get::<Value>(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for PUT /cache/:key
///
/// Writes a value to the persistent tier with an optional TTL override.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(message) = req.validate(&key) {
        return Err(CacheError::InvalidRequest(message));
    }

    state.cache.set(&key, &req.value, req.ttl).await;
    Ok(Json(SetResponse::new(key)))
}

/// Handler for DELETE /cache/:key
///
/// Drops the key from both tiers.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if let Some(message) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(message));
    }

    state.cache.invalidate(&key).await;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.cache.clear_all().await;
    Json(ClearResponse::all(removed))
}

/// Handler for DELETE /users/:user_id/cache
pub async fn clear_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearResponse>> {
    if user_id.is_empty() {
        return Err(CacheError::InvalidRequest("User id cannot be empty".to_string()));
    }

    let removed = state.cache.clear_user_cache(&user_id).await;
    Ok(Json(ClearResponse::user(&user_id, removed)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsReport> {
    Json(state.cache.stats().await)
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.is_online()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, Ttl};
    use crate::network::ManualConnectivity;
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn test_state() -> AppState {
        let cache = OfflineCache::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(ManualConnectivity::new(true)),
            CacheSettings::default().with_poll_interval(None),
        );
        AppState::new(cache)
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let req = SetRequest {
            value: json!({"cash": 10}),
            ttl: None,
        };
        let result = set_handler(State(state.clone()), Path("portfolio".to_string()), Json(req)).await;
        assert!(result.is_ok());

        let response = get_handler(State(state), Path("portfolio".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"cash": 10}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let result = get_handler(State(test_state()), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        state.cache.set("to_delete", "value", Some(Ttl::Permanent)).await;

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_user_handler() {
        let state = test_state();
        state.cache.set_for_user("portfolio", "u1", &1, None).await;
        state.cache.set_for_user("portfolio", "u2", &2, None).await;

        let response = clear_user_handler(State(state.clone()), Path("u1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.removed, 1);
        assert_eq!(state.cache.get_for_user::<i32>("portfolio", "u2").await, Some(2));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(test_state())).await;
        assert_eq!(response.memory.hits, 0);
        assert!(response.categories.is_empty());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler(State(test_state())).await;
        assert_eq!(response.status, "healthy");
        assert!(response.online);
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let req = SetRequest {
            value: json!("value"),
            ttl: None,
        };
        let result = set_handler(State(test_state()), Path(String::new()), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
