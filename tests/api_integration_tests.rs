//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle for each diagnostics endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use offline_cache::api::create_router;
use offline_cache::cache::{CacheSettings, ManualClock};
use offline_cache::network::ManualConnectivity;
use offline_cache::store::InMemoryStore;
use offline_cache::{AppState, OfflineCache};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

struct TestApp {
    router: Router,
    cache: OfflineCache,
    clock: ManualClock,
    net: Arc<ManualConnectivity>,
}

async fn create_test_app() -> TestApp {
    let clock = ManualClock::new(1_000_000);
    let net = Arc::new(ManualConnectivity::new(true));
    let cache = OfflineCache::new(
        Arc::new(InMemoryStore::new()),
        net.clone(),
        CacheSettings::default()
            .with_poll_interval(None)
            .with_clock(clock.clone()),
    );
    cache.initialize().await;
    TestApp {
        router: create_router(AppState::new(cache.clone())),
        cache,
        clock,
        net,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    // Extractor rejections come back as plain text
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_reports_connectivity() {
    let app = create_test_app().await;

    let (status, json) = send(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["online"], true);

    app.net.set_online(false);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let (_, json) = send(&app.router, "GET", "/health", None).await;
    assert_eq!(json["online"], false);
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_set_then_get() {
    let app = create_test_app().await;

    let (status, json) = send(
        &app.router,
        "PUT",
        "/cache/portfolio_u1",
        Some(r#"{"value":{"cash":250,"positions":["AAPL"]}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("portfolio_u1"));

    let (status, json) = send(&app.router, "GET", "/cache/portfolio_u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "portfolio_u1");
    assert_eq!(json["value"], json!({"cash": 250, "positions": ["AAPL"]}));
}

#[tokio::test]
async fn test_get_missing_key_is_404() {
    let app = create_test_app().await;

    let (status, json) = send(&app.router, "GET", "/cache/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_expired_key_is_404() {
    let app = create_test_app().await;

    send(&app.router, "PUT", "/cache/quotes", Some(r#"{"value":1,"ttl":1000}"#)).await;
    app.clock.advance(1_001);

    let (status, _) = send(&app.router, "GET", "/cache/quotes", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_permanent_ttl_outlives_default() {
    let app = create_test_app().await;

    send(&app.router, "PUT", "/cache/pinned", Some(r#"{"value":"x","ttl":-1}"#)).await;
    app.clock.advance(365 * 24 * 60 * 60 * 1000);

    let (status, json) = send(&app.router, "GET", "/cache/pinned", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], "x");
}

#[tokio::test]
async fn test_set_rejects_oversized_key() {
    let app = create_test_app().await;
    let uri = format!("/cache/{}", "k".repeat(300));

    let (status, json) = send(&app.router, "PUT", &uri, Some(r#"{"value":1}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_set_rejects_malformed_body() {
    let app = create_test_app().await;

    let (status, body) = send(&app.router, "PUT", "/cache/k", Some(r#"{"ttl":5}"#)).await;
    assert!(status.is_client_error());
    assert!(body.as_str().is_some_and(|text| text.contains("value")));

    let (status, _) = send(&app.router, "GET", "/cache/k", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_invalidates_both_tiers() {
    let app = create_test_app().await;
    app.cache.set("watchlist", &json!(["BTC"]), None).await;
    app.cache.set_in_memory("watchlist", &json!(["BTC"]), None);

    let (status, _) = send(&app.router, "DELETE", "/cache/watchlist", None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.cache.get::<Value>("watchlist").await, None);
    assert_eq!(app.cache.get_from_memory::<Value>("watchlist", None), None);
}

// == Clear Endpoint Tests ==

#[tokio::test]
async fn test_clear_all() {
    let app = create_test_app().await;
    app.cache.set("app_settings", &json!({"theme": "dark"}), None).await;
    app.cache.set_for_user("trades", "u1", &json!([]), None).await;

    let (status, json) = send(&app.router, "DELETE", "/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);

    let (status, _) = send(&app.router, "GET", "/cache/app_settings", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_user_cache() {
    let app = create_test_app().await;
    app.cache.set_for_user("trades", "u1", &1, None).await;
    app.cache.set_for_user("watchlist", "u1", &2, None).await;
    app.cache.set_for_user("trades", "u2", &3, None).await;

    let (status, json) = send(&app.router, "DELETE", "/users/u1/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);

    let (status, _) = send(&app.router, "GET", "/cache/trades_u2", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app.router, "GET", "/cache/trades_u1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == Stats Endpoint Tests ==

#[tokio::test]
async fn test_stats_reports_categories_and_memory() {
    let app = create_test_app().await;
    app.cache.set("app_settings", &json!({"theme": "dark"}), None).await;
    app.cache.set("market_data", &json!([1, 2, 3]), None).await;
    app.cache.set_in_memory("market_data", &json!([1, 2, 3]), None);
    app.cache.get_from_memory::<Value>("market_data", None);
    app.cache.get_from_memory::<Value>("missing", None);

    let (status, json) = send(&app.router, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);

    let categories = json["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 2);
    assert!(json["total_size"].as_u64().unwrap() > 0);
    assert_eq!(json["oldest_cache"], 1_000_000);
    assert_eq!(json["memory"]["hits"], 1);
    assert_eq!(json["memory"]["misses"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_test_app().await;
    let (status, _) = send(&app.router, "GET", "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
