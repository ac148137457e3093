//! The error taxonomy: one typed enum realizing every HTTP-surfaced
//! failure kind, plus the providers and store errors that convert into it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Every failure kind the system distinguishes. The variant name is
/// serialized verbatim as the `code` field of the error body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing/invalid/inactive credential.
    #[error("{0}")]
    Auth(String),
    /// Malformed payload, unknown enum, type mismatch.
    #[error("{0}")]
    Validation(String),
    /// Uniqueness violation in a user-driven create.
    #[error("{message}")]
    Conflict {
        /// Human-readable detail.
        message: String,
        /// The id of the row that already exists.
        existing_id: String,
    },
    /// Addressed entity missing.
    #[error("{0}")]
    NotFound(String),
    /// DB deadlock, network/SMTP timeout, 5xx from a provider - retryable.
    #[error("{0}")]
    Transient(String),
    /// A provider rejected the request in a way retrying cannot fix.
    #[error("{0}")]
    PermanentProvider(String),
    /// An internal consistency violation recovered in place; never surfaced
    /// to a caller as an error response. Kept as a variant so internal
    /// call sites can still express "this was an invariant, not a bug".
    #[error("{0}")]
    Invariant(String),
    /// Unreadable configuration or schema mismatch; prevents startup.
    #[error("{0}")]
    Fatal(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "AUTH",
            AppError::Validation(_) => "VALIDATION",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Transient(_) => "TRANSIENT",
            AppError::PermanentProvider(_) => "PERMANENT_PROVIDER",
            AppError::Invariant(_) => "INVARIANT",
            AppError::Fatal(_) => "FATAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PermanentProvider(_) => StatusCode::BAD_GATEWAY,
            AppError::Invariant(_) => StatusCode::OK,
            AppError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The shared JSON shape for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Taxonomy kind, e.g. "VALIDATION".
    pub code: String,
    /// Request correlation id, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Structured detail, e.g. `{existing_id: "..."}` for CONFLICT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();
        let detail = match &self {
            AppError::Conflict { existing_id, .. } => {
                Some(serde_json::json!({ "existing_id": existing_id }))
            }
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            code: code.clone(),
            correlation_id: None,
            detail,
        };
        tracing::warn!(code = %code, error = %body.error, "request error");
        (status, Json(body)).into_response()
    }
}

/// Store-level errors, converted to [`AppError`] at the component boundary
/// where taxonomy classification actually happens (a unique-violation
/// means something different on an ingest insert than on an http target
/// create, for instance).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint was violated.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// The referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Any other backend failure (connection, serialization, etc).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::UniqueViolation(db_err.message().to_string());
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound(err.to_string());
        }
        StoreError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_carries_existing_id_in_detail() {
        let err = AppError::Conflict {
            message: "duplicate url".into(),
            existing_id: "abc-123".into(),
        };
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn auth_maps_to_401() {
        assert_eq!(AppError::Auth("missing key".into()).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn validation_maps_to_422() {
        assert_eq!(
            AppError::Validation("bad type".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
