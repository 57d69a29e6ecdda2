//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, clear_user_handler, delete_handler, get_handler, health_handler, set_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/cache", delete(clear_handler))
        .route(
            "/cache/:key",
            get(get_handler).put(set_handler).delete(delete_handler),
        )
        .route("/users/:user_id/cache", delete(clear_user_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, OfflineCache};
    use crate::network::ManualConnectivity;
    use crate::store::InMemoryStore;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let cache = OfflineCache::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(ManualConnectivity::new(true)),
            CacheSettings::default().with_poll_interval(None),
        );
        create_router(AppState::new(cache))
    }

    async fn status_of(app: Router, method: &str, uri: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(status_of(create_test_app(), "GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        assert_eq!(status_of(create_test_app(), "GET", "/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/cache/portfolio")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"value":{"cash":1}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        assert_eq!(
            status_of(create_test_app(), "GET", "/cache/nonexistent").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_clear_endpoints() {
        assert_eq!(status_of(create_test_app(), "DELETE", "/cache").await, StatusCode::OK);
        assert_eq!(
            status_of(create_test_app(), "DELETE", "/users/u1/cache").await,
            StatusCode::OK
        );
    }
}
