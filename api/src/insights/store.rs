use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use vitals_core::category::RecommendationCategory;
use vitals_core::insights::{
    Assessment, AssessmentStatus, ChatRole, ChatTurn, Priority, Recommendation, Report,
    ReportData, UserRecord,
};
use vitals_core::notifications::{Notification, NotificationType};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// Everything the commit point writes for one insight run.
#[derive(Debug, Clone)]
pub struct InsightCommit {
    pub report: Report,
    pub recommendations: Vec<Recommendation>,
}

/// What the store holds after a commit. The report id is the pre-existing
/// one when the report was overwritten in place.
#[derive(Debug, Clone)]
pub struct CommittedInsights {
    pub report: Report,
    pub recommendations: Vec<Recommendation>,
}

/// Persistence seam for the insight pipeline.
pub trait InsightStore: Send + Sync {
    fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;

    fn find_assessment(
        &self,
        assessment_id: Uuid,
    ) -> impl Future<Output = Result<Option<Assessment>, StoreError>> + Send;

    /// Most recent chat turns for the user, newest first.
    fn recent_chat_turns(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ChatTurn>, StoreError>> + Send;

    /// Upsert the report by assessment and replace the user's recommendation
    /// set, atomically.
    fn commit_insights(
        &self,
        commit: InsightCommit,
    ) -> impl Future<Output = Result<CommittedInsights, StoreError>> + Send;

    fn insert_notifications(
        &self,
        notifications: Vec<Notification>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    fn find_report(
        &self,
        assessment_id: Uuid,
    ) -> impl Future<Output = Result<Option<Report>, StoreError>> + Send;

    fn list_recommendations(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Recommendation>, StoreError>> + Send;

    /// Newest first.
    fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Notification>, StoreError>> + Send;

    fn count_unread_notifications(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Returns `None` when the notification does not exist or is not the user's.
    fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> impl Future<Output = Result<Option<Notification>, StoreError>> + Send;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgInsightStore {
    pool: PgPool,
}

impl PgInsightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    external_id: String,
    display_name: Option<String>,
    email: Option<String>,
}

impl UserRow {
    fn into_user(self) -> UserRecord {
        UserRecord {
            id: self.id,
            external_id: self.external_id,
            display_name: self.display_name,
            email: self.email,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: Uuid,
    user_id: Uuid,
    data: serde_json::Value,
    risk_scores: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
}

impl AssessmentRow {
    fn into_assessment(self) -> Assessment {
        Assessment {
            id: self.id,
            user_id: self.user_id,
            data: self.data,
            risk_scores: self.risk_scores,
            status: AssessmentStatus::from_db_value(&self.status),
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    assessment_id: Uuid,
    user_id: Uuid,
    report_data: Json<ReportData>,
    generated_at: DateTime<Utc>,
}

impl ReportRow {
    fn into_report(self) -> Report {
        Report {
            id: self.id,
            assessment_ref: self.assessment_id,
            user_ref: self.user_id,
            report_data: self.report_data.0,
            generated_at: self.generated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RecommendationRow {
    id: Uuid,
    user_id: Uuid,
    assessment_id: Uuid,
    category: String,
    title: String,
    advice: String,
    priority: String,
    generated_at: DateTime<Utc>,
}

impl RecommendationRow {
    fn into_recommendation(self) -> Recommendation {
        Recommendation {
            id: self.id,
            user_ref: self.user_id,
            assessment_ref: self.assessment_id,
            category: RecommendationCategory::from_db_value(&self.category),
            title: self.title,
            advice: self.advice,
            priority: Priority::from_db_value(&self.priority),
            generated_at: self.generated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    message: String,
    #[sqlx(rename = "type")]
    notification_type: String,
    is_read: bool,
    recommendation_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> Notification {
        Notification {
            id: self.id,
            user_ref: self.user_id,
            message: self.message,
            notification_type: NotificationType::from_db_value(&self.notification_type),
            is_read: self.is_read,
            recommendation_ref: self.recommendation_id,
            created_at: self.created_at,
        }
    }
}

const RECOMMENDATION_COLUMNS: &str =
    "id, user_id, assessment_id, category, title, advice, priority, generated_at";
const NOTIFICATION_COLUMNS: &str =
    "id, user_id, message, type, is_read, recommendation_id, created_at";

impl InsightStore for PgInsightStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, display_name, email FROM users WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRow::into_user))
    }

    async fn find_assessment(&self, assessment_id: Uuid) -> Result<Option<Assessment>, StoreError> {
        let row = sqlx::query_as::<_, AssessmentRow>(
            "SELECT id, user_id, data, risk_scores, status, created_at \
             FROM assessments WHERE id = $1",
        )
        .bind(assessment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AssessmentRow::into_assessment))
    }

    async fn recent_chat_turns(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChatTurn>, StoreError> {
        let rows = sqlx::query_as::<_, ChatRow>(
            "SELECT role, content, created_at FROM chat_messages \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ChatTurn {
                role: ChatRole::from_db_value(&row.role),
                content: row.content,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn commit_insights(&self, commit: InsightCommit) -> Result<CommittedInsights, StoreError> {
        let InsightCommit {
            report,
            recommendations,
        } = commit;

        let mut tx = self.pool.begin().await?;

        // Serialize concurrent commits for the same user across nodes.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(report.user_ref.to_string())
            .execute(&mut *tx)
            .await?;

        let report = sqlx::query_as::<_, ReportRow>(
            r#"
            INSERT INTO reports (id, assessment_id, user_id, report_data, generated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (assessment_id) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                report_data = EXCLUDED.report_data,
                generated_at = EXCLUDED.generated_at
            RETURNING id, assessment_id, user_id, report_data, generated_at
            "#,
        )
        .bind(report.id)
        .bind(report.assessment_ref)
        .bind(report.user_ref)
        .bind(Json(&report.report_data))
        .bind(report.generated_at)
        .fetch_one(&mut *tx)
        .await?
        .into_report();

        let replaced = sqlx::query("DELETE FROM recommendations WHERE user_id = $1")
            .bind(report.user_ref)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut saved = Vec::with_capacity(recommendations.len());
        for rec in recommendations {
            let row = sqlx::query_as::<_, RecommendationRow>(&format!(
                "INSERT INTO recommendations ({RECOMMENDATION_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 RETURNING {RECOMMENDATION_COLUMNS}"
            ))
            .bind(rec.id)
            .bind(rec.user_ref)
            .bind(rec.assessment_ref)
            .bind(rec.category.as_str())
            .bind(&rec.title)
            .bind(&rec.advice)
            .bind(rec.priority.as_str())
            .bind(rec.generated_at)
            .fetch_one(&mut *tx)
            .await?;
            saved.push(row.into_recommendation());
        }

        tx.commit().await?;

        tracing::debug!(
            user_id = %report.user_ref,
            assessment_id = %report.assessment_ref,
            replaced = replaced,
            inserted = saved.len(),
            "Insight commit written"
        );

        Ok(CommittedInsights {
            report,
            recommendations: saved,
        })
    }

    async fn insert_notifications(
        &self,
        notifications: Vec<Notification>,
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let count = notifications.len();
        for notification in notifications {
            sqlx::query(&format!(
                "INSERT INTO notifications ({NOTIFICATION_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ))
            .bind(notification.id)
            .bind(notification.user_ref)
            .bind(&notification.message)
            .bind(notification.notification_type.as_str())
            .bind(notification.is_read)
            .bind(notification.recommendation_ref)
            .bind(notification.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn find_report(&self, assessment_id: Uuid) -> Result<Option<Report>, StoreError> {
        let row = sqlx::query_as::<_, ReportRow>(
            "SELECT id, assessment_id, user_id, report_data, generated_at \
             FROM reports WHERE assessment_id = $1",
        )
        .bind(assessment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ReportRow::into_report))
    }

    async fn list_recommendations(&self, user_id: Uuid) -> Result<Vec<Recommendation>, StoreError> {
        let rows = sqlx::query_as::<_, RecommendationRow>(&format!(
            "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations \
             WHERE user_id = $1 \
             ORDER BY CASE priority WHEN 'High' THEN 0 WHEN 'Medium' THEN 1 ELSE 2 END, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(RecommendationRow::into_recommendation)
            .collect())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND ($2 = FALSE OR is_read = FALSE) \
             ORDER BY created_at DESC, id DESC LIMIT $3"
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(NotificationRow::into_notification)
            .collect())
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "UPDATE notifications SET is_read = TRUE \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(NotificationRow::into_notification))
    }
}
