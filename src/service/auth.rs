//! Request authentication extractors.
//!
//! The operator surface reuses the same bearer ApiKey scheme as the agent
//! ingest path rather than a separate session/credential system: a real
//! operator login flow (SSO, password reset, session cookies) is a
//! collaborating system this crate does not own.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;

use crate::error::AppError;
use crate::ingest;
use crate::types::ClientId;

use super::state::AppState;

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("missing authorization header".into()))?;
    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("authorization header must be a bearer token".into()))
}

/// The authenticated tenant for an ingest request.
pub struct IngestAuth {
    /// The authenticated client.
    pub client_id: ClientId,
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for IngestAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let api_key = ingest::authenticate(state.store.as_ref(), &state.api_key_cache, token).await?;
        Ok(IngestAuth { client_id: api_key.client_id })
    }
}

/// The authenticated tenant for an operator (dashboard/API) request.
pub struct OperatorAuth {
    /// The authenticated client.
    pub client_id: ClientId,
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for OperatorAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let api_key = ingest::authenticate(state.store.as_ref(), &state.api_key_cache, token).await?;
        Ok(OperatorAuth { client_id: api_key.client_id })
    }
}
