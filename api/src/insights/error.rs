use vitals_core::parse::InsightParseError;

use super::model::InsightRequestError;
use super::store::StoreError;

/// Failure taxonomy of insight generation. Everything here happens before
/// or at the commit point; notification failures never appear.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("{message}")]
    InvalidInput {
        field: &'static str,
        message: String,
        received: Option<String>,
    },
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("insight model request failed: {0}")]
    UpstreamInsightFailure(#[from] InsightRequestError),
    #[error("insight model returned an unusable response: {0}")]
    MalformedInsight(#[from] InsightParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
