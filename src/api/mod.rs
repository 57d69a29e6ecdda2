//! API Module
//!
//! HTTP handlers and routing for the cache diagnostics API.
//!
//! # Endpoints
//! - `GET /health` - Health and connectivity
//! - `GET /stats` - Per-category and memory tier statistics
//! - `GET /cache/:key` - Read a persisted value
//! - `PUT /cache/:key` - Write a value with optional TTL
//! - `DELETE /cache/:key` - Invalidate a key in both tiers
//! - `DELETE /cache` - Clear every category
//! - `DELETE /users/:user_id/cache` - Clear one user's keys

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
