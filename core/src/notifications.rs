use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::category::RecommendationCategory;
use crate::insights::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Warning,
    Alert,
    Recommendation,
    System,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Warning => "warning",
            NotificationType::Alert => "alert",
            NotificationType::Recommendation => "recommendation",
            NotificationType::System => "system",
        }
    }

    pub fn from_db_value(value: &str) -> Self {
        match value {
            "warning" => NotificationType::Warning,
            "alert" => NotificationType::Alert,
            "recommendation" => NotificationType::Recommendation,
            "system" => NotificationType::System,
            _ => NotificationType::Info,
        }
    }
}

/// A user-facing alert. Recommendation notifications carry a back-reference
/// to the recommendation that spawned them; they do not own it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_ref: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

/// Message for a recommendation notification, or `None` when the priority
/// does not warrant one.
pub fn recommendation_message(
    priority: Priority,
    category: RecommendationCategory,
    title: &str,
) -> Option<String> {
    if !priority.notifies() {
        return None;
    }
    Some(format!(
        "[{} PRIORITY] {}: {}",
        priority.as_str().to_uppercase(),
        category.label(),
        title.trim()
    ))
}
