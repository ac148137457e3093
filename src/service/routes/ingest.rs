//! Agent-facing ingest endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::error::AppError;
use crate::evaluator::IncidentIntent;
use crate::ingest::{self, IngestAck, IngestBatch};
use crate::types::Subject;

use super::super::auth::IngestAuth;
use super::super::state::AppState;

/// `POST /api/v1/ingest/metrics`
///
/// An optional `X-Ingest-Id` header makes the submission idempotent: a
/// retried batch with the same id is accepted but produces no new samples
/// or evaluations.
pub async fn ingest_metrics(
    State(state): State<Arc<AppState>>,
    auth: IngestAuth,
    headers: HeaderMap,
    Json(batch): Json<IngestBatch>,
) -> Result<Json<IngestAck>, AppError> {
    let ingest_id = headers
        .get("X-Ingest-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| {
            Uuid::parse_str(s).map_err(|_| AppError::Validation("X-Ingest-Id must be a uuid".into()))
        })
        .transpose()?;

    let (ack, intents, machine_id) =
        ingest::ingest(state.store.as_ref(), auth.client_id, ingest_id, batch).await?;

    for intent in intents {
        if state.runtime.enqueue_evaluation(intent).await.is_err() {
            tracing::warn!("evaluate queue closed, dropping evaluation for an accepted ingest");
        }
    }

    // A machine that just ingested is alive; resolve its heartbeat incident
    // if one is open, through the same incident pipeline the heartbeat scan
    // opened it with.
    let heartbeat_subject = Subject::Heartbeat {
        client_id: auth.client_id,
        machine_id,
    };
    let open_heartbeat_incident = state
        .store
        .find_open_incident(heartbeat_subject)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    if open_heartbeat_incident.is_some() {
        let resolve = IncidentIntent::Resolve { subject: heartbeat_subject };
        if state.runtime.enqueue_incident(resolve).await.is_err() {
            tracing::warn!("incident queue closed, dropping heartbeat resolve for an accepted ingest");
        }
    }

    Ok(Json(ack))
}
