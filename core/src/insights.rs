use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::category::RecommendationCategory;

/// Maximum number of chat turns fed into an insight prompt.
pub const CHAT_HISTORY_LIMIT: usize = 15;

/// Title used when the model omits one for a recommendation.
pub const DEFAULT_RECOMMENDATION_TITLE: &str = "Health recommendation";

/// Recommendation urgency. Drives notification fan-out: only `High` and
/// `Medium` produce notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    /// Case-insensitive parse of a model-supplied priority label.
    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "high" | "urgent" | "critical" => Some(Priority::High),
            "medium" | "moderate" | "normal" => Some(Priority::Medium),
            "low" | "minor" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn from_db_value(value: &str) -> Self {
        Self::parse_label(value).unwrap_or(Priority::Medium)
    }

    pub fn notifies(self) -> bool {
        matches!(self, Priority::High | Priority::Medium)
    }
}

/// Lifecycle of an assessment. Only `Completed` assessments are meant to be
/// submitted for insights, but the pipeline does not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentStatus {
    Draft,
    Completed,
}

impl AssessmentStatus {
    pub fn from_db_value(value: &str) -> Self {
        match value {
            "completed" => AssessmentStatus::Completed,
            _ => AssessmentStatus::Draft,
        }
    }
}

/// Internal user record, keyed by the identity provider's subject id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A submitted health self-assessment. Read-only input to insight generation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Diet, lifestyle, medical history, vital signs. Free-form.
    pub data: serde_json::Value,
    pub risk_scores: serde_json::Value,
    pub status: AssessmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn from_db_value(value: &str) -> Self {
        match value {
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::User,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        }
    }
}

/// One turn of the user's recent conversation with the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the risk scorecard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Structured report payload produced by the model.
/// Unknown keys from the model are kept in `extra` so nothing is lost on
/// persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    #[serde(default)]
    pub risk_summary: String,
    #[serde(default)]
    pub scorecards: Vec<Scorecard>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// AI-synthesized report, one per assessment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    /// Unique: at most one report exists per assessment.
    pub assessment_ref: Uuid,
    pub user_ref: Uuid,
    pub report_data: ReportData,
    pub generated_at: DateTime<Utc>,
}

/// A persisted recommendation. Replaced wholesale per user on every
/// successful insight generation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: Uuid,
    pub user_ref: Uuid,
    pub assessment_ref: Uuid,
    pub category: RecommendationCategory,
    pub title: String,
    pub advice: String,
    pub priority: Priority,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInsightsRequest {
    /// Assessment to generate insights for (UUID).
    #[serde(default)]
    pub assessment_reference: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateInsightsResponse {
    pub report: Report,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationListResponse {
    pub recommendations: Vec<Recommendation>,
}
