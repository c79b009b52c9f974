//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::domain::errors::CoreError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// An error ready to leave the HTTP layer.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody { error: message.into(), code: code.to_string() },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let (status, code) = match &err {
            CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            CoreError::MissingOrgContext => (StatusCode::BAD_REQUEST, "missing_org_context"),
            CoreError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            CoreError::UsePartialOverrideForFullTimes => {
                (StatusCode::BAD_REQUEST, "use_partial_override_for_full_times")
            }
            CoreError::ConflictState(_) => (StatusCode::CONFLICT, "conflict_state"),
            CoreError::NoOnCallFound { .. } => (StatusCode::NOT_FOUND, "no_on_call_found"),
            CoreError::DependencyFailed(_) => (StatusCode::BAD_GATEWAY, "dependency_failed"),
            CoreError::Database(_) | CoreError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        // Do not leak internals on 5xx.
        let message = if status.is_server_error() {
            tracing::error!(error = %err, "internal error on request path");
            "internal error".to_string()
        } else {
            err.to_string()
        };

        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
