use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response.
/// Every error carries enough information for the caller to tell
/// "your input was bad" apart from "the insight service is unavailable"
/// and "the model answered with something unusable".
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
    /// Whether repeating the same request may succeed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const UPSTREAM_INSIGHT_FAILURE: &str = "upstream_insight_failure";
    pub const MALFORMED_INSIGHT: &str = "malformed_insight";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
