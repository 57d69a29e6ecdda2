//! Error types for the offline cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message reported when the device is offline and nothing is cached.
pub const OFFLINE_NO_DATA: &str = "No cached data available offline";

// == Store Error Enum ==
/// Failure of the durable key-value store backing the persistent tier.
///
/// Never surfaced to cache callers: the persistent tier logs it and
/// treats the operation as a miss or a no-op.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem or device I/O failed
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend specific failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

// == Network Error Enum ==
/// Failure of the platform connectivity primitive.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The connectivity probe itself failed
    #[error("Connectivity probe failed: {0}")]
    Probe(String),

    /// No connectivity primitive is available on this platform
    #[error("Connectivity primitive unavailable")]
    Unavailable,
}

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Persistent store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller supplied fetcher failed
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Offline with nothing cached for the requested key
    #[error("{0}")]
    OfflineUnavailable(String),

    /// Cached data did not match the requested type
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key not present in the cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Malformed diagnostics request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Builds the offline error for a key with no cached value.
    pub fn offline() -> Self {
        CacheError::OfflineUnavailable(OFFLINE_NO_DATA.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::OfflineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Fetch(_) => StatusCode::BAD_GATEWAY,
            CacheError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::Store(_) | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
