//! API route handlers
//!
//! - `health`: liveness, readiness and stack status
//! - `memory`: translation-memory lookup, writes and similarity search
//! - `thresholds`: the similarity cutoff table and score classification

pub mod health;
pub mod memory;
pub mod thresholds;

use crate::error::ServerError;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// `GET /`: service name, version and endpoint list. No authentication.
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "name": "TMKB Server",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/api/v1/memory/lookup",
            "/api/v1/memory/lookup/batch",
            "/api/v1/memory/entries",
            "/api/v1/memory/search",
            "/api/v1/thresholds",
            "/api/v1/thresholds/recommended",
            "/api/v1/thresholds/classify",
            "/api/v1/status",
            "/health",
            "/ready"
        ]
    }))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
