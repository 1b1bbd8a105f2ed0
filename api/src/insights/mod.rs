//! Insight generation: assessment → model → report + recommendations →
//! notifications.
//!
//! [`InsightPipeline::generate_insights`] runs in two phases. The commit
//! phase fails fast with no side effects until the store commits the report
//! and recommendation batch together. Notification fan-out runs afterwards
//! and can only ever log.

pub mod error;
pub mod locks;
pub mod model;
pub mod notify;
pub mod prompt;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use vitals_core::insights::{
    Assessment, CHAT_HISTORY_LIMIT, GenerateInsightsResponse, Recommendation, Report, UserRecord,
};
use vitals_core::notifications::{Notification, NotificationListResponse};
use vitals_core::parse::{ParsedInsight, RawInsight, parse_insight};

use self::error::InsightError;
use self::locks::UserLocks;
use self::model::{InsightModel, InsightRequestError};
use self::prompt::{InsightPrompt, build_insight_prompt, truncate_chars};
use self::store::{CommittedInsights, InsightCommit, InsightStore};

const NOTIFICATION_PAGE_LIMIT: i64 = 100;

pub struct InsightPipeline<S, M> {
    store: S,
    model: M,
    locks: UserLocks,
    model_timeout: Duration,
}

impl<S: InsightStore, M: InsightModel> InsightPipeline<S, M> {
    pub fn new(store: S, model: M, model_timeout: Duration) -> Self {
        Self {
            store,
            model,
            locks: UserLocks::default(),
            model_timeout,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Generate, persist and return insights for one assessment.
    ///
    /// Runs for the same user are serialized, so the stored report and
    /// recommendation batch always come from the same model call.
    pub async fn generate_insights(
        &self,
        subject: &str,
        assessment_reference: Option<&str>,
    ) -> Result<GenerateInsightsResponse, InsightError> {
        let assessment_id = parse_assessment_reference(assessment_reference)?;
        let user = self.resolve_user(subject).await?;
        tracing::debug!(user_id = %user.id, assessment_id = %assessment_id, "Generating insights");

        let _guard = self.locks.acquire(user.id).await;

        let committed = self.commit_phase(&user, assessment_id).await?;

        notify::derive_notifications(&self.store, user.id, &committed.recommendations).await;

        Ok(GenerateInsightsResponse {
            report: committed.report,
            recommendations: committed.recommendations,
        })
    }

    async fn commit_phase(
        &self,
        user: &UserRecord,
        assessment_id: Uuid,
    ) -> Result<CommittedInsights, InsightError> {
        let assessment = self.load_owned_assessment(user, assessment_id).await?;

        let chat = match self
            .store
            .recent_chat_turns(user.id, CHAT_HISTORY_LIMIT)
            .await
        {
            Ok(turns) => turns,
            Err(err) => {
                tracing::warn!(
                    user_id = %user.id,
                    error = %err,
                    "Chat history unavailable; generating insights without it"
                );
                Vec::new()
            }
        };

        let prompt = build_insight_prompt(&assessment, &chat);
        let raw = self.request_with_deadline(&prompt).await.inspect_err(|err| {
            tracing::warn!(
                user_id = %user.id,
                assessment_id = %assessment.id,
                error = %err,
                "Insight model request failed"
            );
        })?;

        let parsed = parse_insight(&raw).inspect_err(|err| {
            tracing::warn!(
                user_id = %user.id,
                assessment_id = %assessment.id,
                error = %err,
                response_preview = truncate_chars(raw.as_str(), 200),
                "Insight model response unusable"
            );
        })?;

        let commit = build_commit(user.id, &assessment, parsed, Utc::now());
        let committed = self.store.commit_insights(commit).await?;

        tracing::info!(
            user_id = %user.id,
            assessment_id = %assessment.id,
            report_id = %committed.report.id,
            recommendations = committed.recommendations.len(),
            "Insights committed"
        );
        Ok(committed)
    }

    async fn request_with_deadline(
        &self,
        prompt: &InsightPrompt,
    ) -> Result<RawInsight, InsightRequestError> {
        tracing::debug!(
            prompt_chars = prompt.system.len() + prompt.user.len(),
            timeout_secs = self.model_timeout.as_secs(),
            "Requesting insight from model"
        );
        tokio::time::timeout(self.model_timeout, self.model.request_insight(prompt))
            .await
            .map_err(|_| InsightRequestError::Timeout(self.model_timeout))?
    }

    async fn load_owned_assessment(
        &self,
        user: &UserRecord,
        assessment_id: Uuid,
    ) -> Result<Assessment, InsightError> {
        match self.store.find_assessment(assessment_id).await? {
            Some(assessment) if assessment.user_id == user.id => Ok(assessment),
            // Someone else's assessment is indistinguishable from a missing one.
            _ => Err(InsightError::NotFound {
                resource: format!("Assessment {assessment_id}"),
            }),
        }
    }

    /// Resolve the caller's subject id to the internal user. Users are
    /// created upstream; an unknown subject is `NotFound`.
    pub async fn resolve_user(&self, subject: &str) -> Result<UserRecord, InsightError> {
        self.store
            .find_user_by_external_id(subject)
            .await?
            .ok_or_else(|| InsightError::NotFound {
                resource: "User".to_string(),
            })
    }

    pub async fn report_for(
        &self,
        subject: &str,
        assessment_id: Uuid,
    ) -> Result<Report, InsightError> {
        let user = self.resolve_user(subject).await?;
        match self.store.find_report(assessment_id).await? {
            Some(report) if report.user_ref == user.id => Ok(report),
            _ => Err(InsightError::NotFound {
                resource: format!("Report for assessment {assessment_id}"),
            }),
        }
    }

    pub async fn recommendations_for(
        &self,
        subject: &str,
    ) -> Result<Vec<Recommendation>, InsightError> {
        let user = self.resolve_user(subject).await?;
        Ok(self.store.list_recommendations(user.id).await?)
    }

    pub async fn notifications_for(
        &self,
        subject: &str,
        unread_only: bool,
    ) -> Result<NotificationListResponse, InsightError> {
        let user = self.resolve_user(subject).await?;
        let notifications = self
            .store
            .list_notifications(user.id, unread_only, NOTIFICATION_PAGE_LIMIT)
            .await?;
        let unread_count = self.store.count_unread_notifications(user.id).await?;
        Ok(NotificationListResponse {
            notifications,
            unread_count,
        })
    }

    pub async fn mark_notification_read(
        &self,
        subject: &str,
        notification_id: Uuid,
    ) -> Result<Notification, InsightError> {
        let user = self.resolve_user(subject).await?;
        self.store
            .mark_notification_read(user.id, notification_id)
            .await?
            .ok_or_else(|| InsightError::NotFound {
                resource: format!("Notification {notification_id}"),
            })
    }
}

/// Validate the assessment reference before any I/O happens.
pub fn parse_assessment_reference(raw: Option<&str>) -> Result<Uuid, InsightError> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(InsightError::InvalidInput {
            field: "assessmentReference",
            message: "assessmentReference is required".to_string(),
            received: raw.map(ToString::to_string),
        });
    }
    Uuid::parse_str(trimmed).map_err(|_| InsightError::InvalidInput {
        field: "assessmentReference",
        message: "assessmentReference must be a UUID".to_string(),
        received: Some(trimmed.to_string()),
    })
}

fn build_commit(
    user_id: Uuid,
    assessment: &Assessment,
    parsed: ParsedInsight,
    generated_at: DateTime<Utc>,
) -> InsightCommit {
    let recommendations = parsed
        .recommendations
        .iter()
        .map(|rec| Recommendation {
            id: Uuid::now_v7(),
            user_ref: user_id,
            assessment_ref: assessment.id,
            category: rec.normalized_category(),
            title: rec.title_or_default().to_string(),
            advice: rec.advice.clone(),
            priority: rec.priority_or_default(),
            generated_at,
        })
        .collect();

    InsightCommit {
        report: Report {
            id: Uuid::now_v7(),
            assessment_ref: assessment.id,
            user_ref: user_id,
            report_data: parsed.report,
            generated_at,
        },
        recommendations,
    }
}
