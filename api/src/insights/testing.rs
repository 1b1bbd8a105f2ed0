//! In-memory store and scripted model for pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use vitals_core::insights::{
    Assessment, AssessmentStatus, ChatRole, ChatTurn, Recommendation, Report, UserRecord,
};
use vitals_core::notifications::Notification;
use vitals_core::parse::RawInsight;

use super::model::{InsightModel, InsightRequestError};
use super::prompt::InsightPrompt;
use super::store::{CommittedInsights, InsightCommit, InsightStore, StoreError};

#[derive(Default)]
struct MemoryState {
    users: Vec<UserRecord>,
    assessments: Vec<Assessment>,
    chat: Vec<(Uuid, ChatTurn)>,
    reports: Vec<Report>,
    recommendations: Vec<Recommendation>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_notifications: AtomicBool,
    fail_chat: AtomicBool,
}

impl MemoryStore {
    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn add_user(&self, external_id: &str) -> UserRecord {
        let user = UserRecord {
            id: Uuid::now_v7(),
            external_id: external_id.to_string(),
            display_name: None,
            email: None,
        };
        self.state().users.push(user.clone());
        user
    }

    pub fn add_assessment(&self, user_id: Uuid, data: serde_json::Value) -> Assessment {
        let assessment = Assessment {
            id: Uuid::now_v7(),
            user_id,
            data,
            risk_scores: serde_json::json!({}),
            status: AssessmentStatus::Completed,
            created_at: Utc::now(),
        };
        self.state().assessments.push(assessment.clone());
        assessment
    }

    pub fn add_chat(&self, user_id: Uuid, role: ChatRole, content: &str) {
        let turn = ChatTurn {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.state().chat.push((user_id, turn));
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    pub fn fail_chat(&self, fail: bool) {
        self.fail_chat.store(fail, Ordering::SeqCst);
    }

    pub fn has_assessment(&self, assessment_id: Uuid) -> bool {
        self.state().assessments.iter().any(|a| a.id == assessment_id)
    }

    pub fn reports_for_assessment(&self, assessment_id: Uuid) -> Vec<Report> {
        self.state()
            .reports
            .iter()
            .filter(|r| r.assessment_ref == assessment_id)
            .cloned()
            .collect()
    }

    pub fn recommendations_for_user(&self, user_id: Uuid) -> Vec<Recommendation> {
        self.state()
            .recommendations
            .iter()
            .filter(|r| r.user_ref == user_id)
            .cloned()
            .collect()
    }

    pub fn notifications_for_user(&self, user_id: Uuid) -> Vec<Notification> {
        self.state()
            .notifications
            .iter()
            .filter(|n| n.user_ref == user_id)
            .cloned()
            .collect()
    }
}

impl InsightStore for MemoryStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn find_assessment(&self, assessment_id: Uuid) -> Result<Option<Assessment>, StoreError> {
        Ok(self
            .state()
            .assessments
            .iter()
            .find(|a| a.id == assessment_id)
            .cloned())
    }

    async fn recent_chat_turns(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChatTurn>, StoreError> {
        if self.fail_chat.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("chat collection offline".to_string()));
        }
        Ok(self
            .state()
            .chat
            .iter()
            .rev()
            .filter(|(owner, _)| *owner == user_id)
            .take(limit)
            .map(|(_, turn)| turn.clone())
            .collect())
    }

    async fn commit_insights(&self, commit: InsightCommit) -> Result<CommittedInsights, StoreError> {
        let mut state = self.state();
        let InsightCommit {
            mut report,
            recommendations,
        } = commit;

        match state
            .reports
            .iter_mut()
            .find(|existing| existing.assessment_ref == report.assessment_ref)
        {
            Some(existing) => {
                report.id = existing.id;
                *existing = report.clone();
            }
            None => state.reports.push(report.clone()),
        }

        state.recommendations.retain(|r| r.user_ref != report.user_ref);
        state.recommendations.extend(recommendations.iter().cloned());

        Ok(CommittedInsights {
            report,
            recommendations,
        })
    }

    async fn insert_notifications(
        &self,
        notifications: Vec<Notification>,
    ) -> Result<usize, StoreError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "notification collection offline".to_string(),
            ));
        }
        let count = notifications.len();
        self.state().notifications.extend(notifications);
        Ok(count)
    }

    async fn find_report(&self, assessment_id: Uuid) -> Result<Option<Report>, StoreError> {
        Ok(self.reports_for_assessment(assessment_id).into_iter().next())
    }

    async fn list_recommendations(&self, user_id: Uuid) -> Result<Vec<Recommendation>, StoreError> {
        Ok(self.recommendations_for_user(user_id))
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .notifications_for_user(user_id)
            .into_iter()
            .rev()
            .filter(|n| !unread_only || !n.is_read)
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .notifications_for_user(user_id)
            .iter()
            .filter(|n| !n.is_read)
            .count() as i64)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Option<Notification>, StoreError> {
        let mut state = self.state();
        Ok(state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_ref == user_id)
            .map(|n| {
                n.is_read = true;
                n.clone()
            }))
    }
}

/// Model that replays queued responses in order.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, InsightRequestError>>>,
    prompts: Mutex<Vec<InsightPrompt>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl ScriptedModel {
    pub fn with_responses<I, T>(responses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_failure(&self, err: InsightRequestError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were awaiting a response at once.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<InsightPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

impl InsightModel for ScriptedModel {
    async fn request_insight(
        &self,
        prompt: &InsightPrompt,
    ) -> Result<RawInsight, InsightRequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        let next = self.responses.lock().unwrap().pop_front();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match next {
            Some(Ok(text)) => Ok(RawInsight::new(text)),
            Some(Err(err)) => Err(err),
            None => Err(InsightRequestError::EmptyResponse),
        }
    }
}
