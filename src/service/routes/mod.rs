//! Route modules and router assembly.

pub mod health;
pub mod http_targets;
pub mod ingest;
pub mod operator;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::middleware::request_logging_middleware;
use super::state::AppState;

/// Assemble the full service router.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/health/startup", get(health::startup))
        .route("/api/v1/ingest/metrics", post(ingest::ingest_metrics))
        .route("/api/v1/http-targets", post(http_targets::create).get(http_targets::list))
        .route("/api/v1/http-targets/:id", delete(http_targets::delete))
        .route("/api/v1/incidents", get(operator::list_incidents))
        .route("/api/v1/incidents/:id/notifications", get(operator::list_notifications))
        .route("/api/v1/machines", get(operator::list_machines))
        .route(
            "/api/v1/settings",
            get(operator::get_settings).put(operator::put_settings),
        )
        .route("/api/v1/metric-instances/:id/alerting", patch(operator::set_alerting))
        .route("/api/v1/metric-instances/:id/pause", patch(operator::set_paused))
        .route(
            "/api/v1/metric-instances/:id/threshold",
            put(operator::set_threshold),
        )
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
