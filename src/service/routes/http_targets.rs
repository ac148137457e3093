//! Operator CRUD over probed HTTP targets.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, StoreError};
use crate::types::{HttpMethod, HttpTarget, HttpTargetId};

use super::super::auth::OperatorAuth;
use super::super::state::AppState;

/// Body of `POST /api/v1/http-targets`.
#[derive(Debug, Deserialize)]
pub struct CreateHttpTargetRequest {
    pub name: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default)]
    pub accepted_status_codes: Vec<u16>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_check_interval_s")]
    pub check_interval_s: u64,
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_check_interval_s() -> u64 {
    60
}

/// Wire representation of an http target.
#[derive(Debug, Serialize)]
pub struct HttpTargetDto {
    pub id: String,
    pub name: String,
    pub url: String,
    pub method: String,
    pub accepted_status_codes: Vec<u16>,
    pub timeout_ms: u64,
    pub check_interval_s: u64,
    pub is_active: bool,
    pub last_check_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_status: Option<u16>,
    pub last_latency_ms: Option<u64>,
}

impl From<HttpTarget> for HttpTargetDto {
    fn from(target: HttpTarget) -> Self {
        Self {
            id: target.id.to_string(),
            name: target.name,
            url: target.url,
            method: target.method.to_string(),
            accepted_status_codes: target.accepted_status_codes,
            timeout_ms: target.timeout_ms,
            check_interval_s: target.check_interval_s,
            is_active: target.is_active,
            last_check_at: target.last_check_at,
            last_status: target.last_status,
            last_latency_ms: target.last_latency_ms,
        }
    }
}

/// `POST /api/v1/http-targets`
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: OperatorAuth,
    Json(request): Json<CreateHttpTargetRequest>,
) -> Result<(StatusCode, Json<HttpTargetDto>), AppError> {
    if !HttpTarget::has_valid_scheme(&request.url) {
        return Err(AppError::Validation("url must be http or https".into()));
    }

    let target = HttpTarget {
        id: HttpTargetId::new(),
        client_id: auth.client_id,
        name: request.name,
        url: request.url,
        method: request.method,
        accepted_status_codes: request.accepted_status_codes,
        timeout_ms: request.timeout_ms,
        check_interval_s: request.check_interval_s,
        is_active: true,
        last_check_at: None,
        last_status: None,
        last_latency_ms: None,
    };

    match state.store.try_insert_http_target(target.clone()).await {
        Ok(()) => Ok((StatusCode::CREATED, Json(target.into()))),
        Err(StoreError::UniqueViolation(_)) => {
            let existing = state
                .store
                .find_http_target_by_url(auth.client_id, &target.url)
                .await
                .map_err(|e| AppError::Transient(e.to_string()))?
                .ok_or_else(|| AppError::Invariant("unique violation but no existing row found".into()))?;
            Err(AppError::Conflict {
                message: format!("an http target for {} already exists", target.url),
                existing_id: existing.id.to_string(),
            })
        }
        Err(e) => Err(AppError::Transient(e.to_string())),
    }
}

/// `GET /api/v1/http-targets`
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: OperatorAuth,
) -> Result<Json<Vec<HttpTargetDto>>, AppError> {
    let targets = state
        .store
        .list_http_targets(auth.client_id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(Json(targets.into_iter().map(HttpTargetDto::from).collect()))
}

/// `DELETE /api/v1/http-targets/:id`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: OperatorAuth,
    Path(id): Path<HttpTargetId>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .delete_http_target(auth.client_id, id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
