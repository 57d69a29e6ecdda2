//! Request and Response models for the diagnostics API
//!
//! This module defines the DTOs used for serializing/deserializing HTTP
//! request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{validate_key, SetRequest};
pub use responses::{ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetResponse};
