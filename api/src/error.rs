use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vitals_core::error::{self, ApiError};

use crate::insights::error::InsightError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Caller identity missing (401)
    Unauthorized {
        message: String,
        docs_hint: Option<String>,
    },
    /// Resource not found (404)
    NotFound { resource: String },
    /// The model call itself failed: timeout, auth, quota, network (500, retryable)
    UpstreamInsight(String),
    /// The model answered but the content was unusable (500)
    MalformedInsight(String),
    /// Database error (500)
    Database(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                    retryable: Some(false),
                },
            ),
            AppError::Unauthorized { message, docs_hint } => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    error: error::codes::UNAUTHORIZED.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint,
                    retryable: Some(false),
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                    retryable: Some(false),
                },
            ),
            AppError::UpstreamInsight(detail) => {
                tracing::warn!(request_id = %request_id, "Upstream insight failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::UPSTREAM_INSIGHT_FAILURE.to_string(),
                        message: format!("The AI insight service is unavailable: {detail}"),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: Some(
                            "Nothing was saved. Retry the request in a moment.".to_string(),
                        ),
                        retryable: Some(true),
                    },
                )
            }
            AppError::MalformedInsight(detail) => {
                tracing::warn!(request_id = %request_id, "Malformed insight: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::MALFORMED_INSIGHT.to_string(),
                        message: format!("The AI service returned an unusable response: {detail}"),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: Some(
                            "Nothing was saved. Retrying may help; if it keeps failing, \
                             review the assessment data."
                                .to_string(),
                        ),
                        retryable: Some(true),
                    },
                )
            }
            AppError::Database(detail) => {
                tracing::error!(request_id = %request_id, "Database error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                        retryable: Some(true),
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<InsightError> for AppError {
    fn from(err: InsightError) -> Self {
        match err {
            InsightError::InvalidInput {
                field,
                message,
                received,
            } => AppError::Validation {
                message,
                field: Some(field.to_string()),
                received: received.map(serde_json::Value::String),
                docs_hint: Some(
                    "Send {\"assessmentReference\": \"<assessment UUID>\"}.".to_string(),
                ),
            },
            InsightError::NotFound { resource } => AppError::NotFound { resource },
            err @ InsightError::UpstreamInsightFailure(_) => {
                AppError::UpstreamInsight(err.to_string())
            }
            err @ InsightError::MalformedInsight(_) => AppError::MalformedInsight(err.to_string()),
            InsightError::Store(err) => AppError::Database(err.to_string()),
        }
    }
}
