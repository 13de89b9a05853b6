//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::repository::RepositoryError;
use crate::services::{DomainError, FieldErrors};

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Malformed request (bad id, unknown enum value)
    BadRequest(String),
    /// Per-field validation failures
    Validation(FieldErrors),
    /// Missing or malformed `x-user-id` actor header
    Unauthorized(String),
    /// Repository error
    Repository(RepositoryError),
    Domain(DomainError),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ApiError) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("VALIDATION_ERROR", "Datos inválidos").with_details(json!(fields)),
            ),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::new("UNAUTHORIZED", msg))
            }
            AppError::Repository(e) => repository_error(e),
            AppError::Domain(e) => domain_error(e),
        }
    }
}

fn repository_error(err: RepositoryError) -> (StatusCode, ApiError) {
    let msg = err.to_string();
    match err {
        RepositoryError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg))
        }
        RepositoryError::Conflict { .. } => (StatusCode::CONFLICT, ApiError::new("CONFLICT", msg)),
        RepositoryError::ValidationError { .. } => {
            (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
        }
        _ => {
            log::error!("Repository failure: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("REPOSITORY_ERROR", msg),
            )
        }
    }
}

fn domain_error(err: DomainError) -> (StatusCode, ApiError) {
    let msg = err.to_string();
    match err {
        DomainError::Validation(fields) => AppError::Validation(fields).status_and_body(),
        DomainError::NotEligible(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::new("NOT_ELIGIBLE", msg),
        ),
        DomainError::InvalidTransition { from, to } => (
            StatusCode::CONFLICT,
            ApiError::new("INVALID_TRANSITION", msg).with_details(json!({ "from": from, "to": to })),
        ),
        DomainError::ConsentRequired(_) => (
            StatusCode::FORBIDDEN,
            ApiError::new("CONSENT_REQUIRED", msg),
        ),
        DomainError::Unavailable { waitlist, .. } => (
            StatusCode::CONFLICT,
            ApiError::new("UNAVAILABLE", msg).with_details(json!({ "waitlist": waitlist })),
        ),
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, ApiError::new("FORBIDDEN", msg)),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, ApiError::new("CONFLICT", msg)),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
        DomainError::Repository(e) => repository_error(e),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_body();
        (status, Json(error)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Domain(err)
    }
}
