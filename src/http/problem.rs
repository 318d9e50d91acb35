//! # Problem Payloads
//!
//! Every error response is one structured shape:
//! `{type, title, status, detail, fieldErrors?}`. Internal faults are
//! logged with their detail and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::executor::EngineError;
use crate::observability::{log_stderr, Severity};

/// The structured error body.
#[derive(Debug, Serialize)]
pub struct ProblemDetail {
    /// Stable machine-readable error type
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Human-readable summary
    pub title: &'static str,
    /// HTTP status code, repeated in the body
    pub status: u16,
    /// Specific description, where one is safe to expose
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Field name → failure reason, for validation errors
    #[serde(rename = "fieldErrors", skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<Map<String, Value>>,
}

/// Engine error wrapper implementing axum's response conversion.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status for the wrapped error.
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            EngineError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Forbidden => StatusCode::FORBIDDEN,
            EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::IncompatibleSchemaChange(_) => StatusCode::CONFLICT,
            EngineError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn problem(&self) -> ProblemDetail {
        let status = self.status_code().as_u16();
        match &self.0 {
            EngineError::ValidationFailed { field, reason } => {
                let mut field_errors = Map::new();
                field_errors.insert(field.clone(), Value::String(reason.clone()));
                ProblemDetail {
                    kind: "validation_failed",
                    title: "Record validation failed",
                    status,
                    detail: None,
                    field_errors: Some(field_errors),
                }
            }
            EngineError::Forbidden => ProblemDetail {
                kind: "forbidden",
                title: "Operation not permitted",
                status,
                detail: None,
                field_errors: None,
            },
            EngineError::NotFound => ProblemDetail {
                kind: "not_found",
                title: "Resource not found",
                status,
                detail: None,
                field_errors: None,
            },
            EngineError::Conflict(detail) => ProblemDetail {
                kind: "conflict",
                title: "Request conflicts with current state",
                status,
                detail: Some(detail.clone()),
                field_errors: None,
            },
            EngineError::IncompatibleSchemaChange(detail) => ProblemDetail {
                kind: "incompatible_schema_change",
                title: "Schema change requires a migration",
                status,
                detail: Some(detail.clone()),
                field_errors: None,
            },
            EngineError::BadRequest(detail) => ProblemDetail {
                kind: "bad_request",
                title: "Malformed request",
                status,
                detail: Some(detail.clone()),
                field_errors: None,
            },
            EngineError::Internal(_) => ProblemDetail {
                kind: "internal",
                title: "Internal error",
                status,
                // The real detail goes to the log, never to the client.
                detail: None,
                field_errors: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let EngineError::Internal(detail) = &self.0 {
            log_stderr(Severity::Error, "request.internal_error", &[("detail", detail)]);
        }
        let status = self.status_code();
        (status, Json(self.problem())).into_response()
    }
}
