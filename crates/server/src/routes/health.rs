use crate::state::ServerState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

static SERVER_START_TIME: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME.elapsed().as_secs()
}

/// Liveness probe. Always 200 while the process is serving.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "tmkb-server",
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness probe.
///
/// The server keeps serving while the vector service is down (lookups return
/// no candidates), so this reports `degraded` with 200 rather than failing.
pub async fn readiness_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let vector_ready = state.stack.availability().is_available();
    Json(json!({
        "status": if vector_ready { "ready" } else { "degraded" },
        "service": "tmkb-server",
        "uptime_seconds": uptime_seconds(),
        "components": {
            "api": "ready",
            "vector_index": if vector_ready { "ready" } else { "unavailable" },
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct StackStatus {
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub embedding_model: String,
    pub backend: &'static str,
    pub collection: String,
    pub vector_fields: Vec<String>,
    pub vector_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// `GET /api/v1/status`
pub async fn stack_status(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let stack = &state.stack;
    let availability = stack.availability();
    let status = StackStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime_seconds(),
        embedding_model: stack.embedder().model_name().to_string(),
        backend: stack.store().backend_name(),
        collection: stack.schema().name.clone(),
        vector_fields: stack.schema().fields.keys().cloned().collect(),
        vector_available: availability.is_available(),
        last_error: availability.last_error(),
    };
    (StatusCode::OK, Json(status))
}
