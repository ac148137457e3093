//! Cloud-Run style health endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::super::state::AppState;

/// Detailed health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"healthy"` or `"degraded"`.
    pub status: String,
    /// Crate version, useful for confirming a rollout landed.
    pub version: String,
    /// Schema version the running process expects.
    pub schema_version: String,
    /// Whether the store backend answered.
    pub store_connected: bool,
}

/// Simple liveness response.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Readiness/startup response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub store_connected: bool,
}

/// `GET /health` - full status, does not gate traffic.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_connected = state.store.is_healthy().await;
    Json(HealthResponse {
        status: if store_connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: crate::SCHEMA_VERSION.to_string(),
        store_connected,
    })
}

/// `GET /health/live` - is the process alive. Never checks dependencies.
pub async fn live() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// `GET /health/ready` - is the process ready to accept traffic.
pub async fn ready(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let store_connected = state.store.is_healthy().await;
    let body = ReadinessResponse { ready: store_connected, store_connected };
    if store_connected {
        Ok(Json(body))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(body)))
    }
}

/// `GET /health/startup` - has the process finished starting up.
///
/// Same check as readiness: there is no separate warm-up phase to model.
pub async fn startup(
    state: State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    ready(state).await
}
