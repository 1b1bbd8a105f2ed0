use chrono::Utc;
use uuid::Uuid;

use vitals_core::insights::Recommendation;
use vitals_core::notifications::{Notification, NotificationType, recommendation_message};

use super::store::{InsightStore, StoreError};

/// Notification fan-out failure. Logged, never returned to the caller of
/// insight generation.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("failed to persist recommendation notifications: {0}")]
    Persist(#[from] StoreError),
}

/// One notification per High/Medium recommendation. Low never notifies.
pub fn notifications_for(user_id: Uuid, recommendations: &[Recommendation]) -> Vec<Notification> {
    let created_at = Utc::now();
    recommendations
        .iter()
        .filter_map(|rec| {
            let message = recommendation_message(rec.priority, rec.category, &rec.title)?;
            Some(Notification {
                id: Uuid::now_v7(),
                user_ref: user_id,
                message,
                notification_type: NotificationType::Recommendation,
                is_read: false,
                recommendation_ref: Some(rec.id),
                created_at,
            })
        })
        .collect()
}

async fn try_derive<S: InsightStore>(
    store: &S,
    user_id: Uuid,
    recommendations: &[Recommendation],
) -> Result<usize, NotificationError> {
    let notifications = notifications_for(user_id, recommendations);
    if notifications.is_empty() {
        return Ok(0);
    }
    Ok(store.insert_notifications(notifications).await?)
}

/// Derive and persist notifications for a freshly committed batch.
///
/// Returns the number created. Any failure is logged and counts as zero.
pub async fn derive_notifications<S: InsightStore>(
    store: &S,
    user_id: Uuid,
    recommendations: &[Recommendation],
) -> usize {
    match try_derive(store, user_id, recommendations).await {
        Ok(created) => {
            tracing::info!(
                user_id = %user_id,
                recommendations = recommendations.len(),
                notifications_created = created,
                "Recommendation notifications derived"
            );
            created
        }
        Err(err) => {
            tracing::error!(
                user_id = %user_id,
                error = %err,
                "Notification derivation failed; insight results are unaffected"
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vitals_core::category::RecommendationCategory;
    use vitals_core::insights::Priority;

    use super::*;
    use crate::insights::testing::MemoryStore;

    fn rec(user_id: Uuid, title: &str, priority: Priority) -> Recommendation {
        Recommendation {
            id: Uuid::now_v7(),
            user_ref: user_id,
            assessment_ref: Uuid::now_v7(),
            category: RecommendationCategory::Lifestyle,
            title: title.to_string(),
            advice: "advice".to_string(),
            priority,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn only_high_and_medium_produce_notifications() {
        let user = Uuid::now_v7();
        let batch = vec![
            rec(user, "a", Priority::High),
            rec(user, "b", Priority::Medium),
            rec(user, "c", Priority::Low),
            rec(user, "d", Priority::Low),
        ];
        let notifications = notifications_for(user, &batch);
        assert_eq!(notifications.len(), 2);

        let referenced: Vec<Uuid> = notifications
            .iter()
            .filter_map(|n| n.recommendation_ref)
            .collect();
        assert_eq!(referenced, vec![batch[0].id, batch[1].id]);
        assert!(!referenced.contains(&batch[2].id));
        assert!(!referenced.contains(&batch[3].id));
        assert!(notifications.iter().all(|n| !n.is_read
            && n.user_ref == user
            && n.notification_type == NotificationType::Recommendation));
    }

    #[tokio::test]
    async fn persists_and_counts_notifications() {
        let store = MemoryStore::default();
        let user = Uuid::now_v7();
        let batch = vec![rec(user, "a", Priority::High), rec(user, "b", Priority::Low)];

        assert_eq!(derive_notifications(&store, user, &batch).await, 1);
        assert_eq!(store.notifications_for_user(user).len(), 1);
    }

    #[tokio::test]
    async fn all_low_batch_creates_nothing() {
        let store = MemoryStore::default();
        let user = Uuid::now_v7();
        store.fail_notifications(true);
        let batch = vec![rec(user, "a", Priority::Low)];

        // No write is attempted, so the injected failure is never hit.
        assert_eq!(derive_notifications(&store, user, &batch).await, 0);
    }

    #[tokio::test]
    async fn persistence_failure_is_swallowed_as_zero() {
        let store = MemoryStore::default();
        store.fail_notifications(true);
        let user = Uuid::now_v7();
        let batch = vec![rec(user, "a", Priority::High)];

        assert_eq!(derive_notifications(&store, user, &batch).await, 0);
        assert!(store.notifications_for_user(user).is_empty());
    }
}
