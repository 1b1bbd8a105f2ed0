use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use vitals_core::error::ApiError;
use vitals_core::notifications::{Notification, NotificationListResponse};

use crate::error::AppError;
use crate::extract::AppQuery;
use crate::identity::CallerIdentity;
use crate::insights::model::InsightModel;
use crate::insights::store::InsightStore;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct NotificationListQuery {
    /// Only return notifications that have not been read
    #[serde(default)]
    pub unread_only: bool,
}

pub fn router<S, M>() -> Router<AppState<S, M>>
where
    S: InsightStore + 'static,
    M: InsightModel + 'static,
{
    Router::new()
        .route("/v1/notifications", get(list_notifications::<S, M>))
        .route(
            "/v1/notifications/{notification_id}/read",
            post(mark_notification_read::<S, M>),
        )
}

/// Newest notifications for the caller (at most 100) and the unread total
#[utoipa::path(
    get,
    path = "/v1/notifications",
    params(NotificationListQuery),
    responses(
        (status = 200, description = "Notifications, newest first", body = NotificationListResponse),
        (status = 400, description = "Invalid query string", body = ApiError),
        (status = 401, description = "No caller identity", body = ApiError),
        (status = 404, description = "Unknown user", body = ApiError)
    ),
    security(("subject_header" = [])),
    tag = "notifications"
)]
pub async fn list_notifications<S: InsightStore, M: InsightModel>(
    State(state): State<AppState<S, M>>,
    identity: CallerIdentity,
    AppQuery(query): AppQuery<NotificationListQuery>,
) -> Result<Json<NotificationListResponse>, AppError> {
    let response = state
        .pipeline
        .notifications_for(&identity.subject, query.unread_only)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/v1/notifications/{notification_id}/read",
    params(
        ("notification_id" = Uuid, Path, description = "Notification to mark as read")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 401, description = "No caller identity", body = ApiError),
        (status = 404, description = "Notification not found for this user", body = ApiError)
    ),
    security(("subject_header" = [])),
    tag = "notifications"
)]
pub async fn mark_notification_read<S: InsightStore, M: InsightModel>(
    State(state): State<AppState<S, M>>,
    identity: CallerIdentity,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state
        .pipeline
        .mark_notification_read(&identity.subject, notification_id)
        .await?;
    Ok(Json(notification))
}
