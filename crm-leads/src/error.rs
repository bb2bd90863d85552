//! Error types for crm-leads

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::dispatcher::DispatchError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Form validation failed (422)
    #[error("Validation failed: {}", .0.join(" "))]
    Validation(Vec<String>),

    /// Conflict (409) - e.g., duplicate email
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Enrichment could not be queued
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// crm-common error
    #[error("Common error: {0}")]
    Common(#[from] crm_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_FAILED",
                "Lead form is invalid".to_string(),
                Some(errors),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            ApiError::Dispatch(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DISPATCH_ERROR",
                err.to_string(),
                None,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
                None,
            ),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = json!(details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
