use std::sync::Arc;

use sqlx::PgPool;

use crate::insights::InsightPipeline;
use crate::insights::model::ChatCompletionsModel;
use crate::insights::store::PgInsightStore;

/// Shared handler state. The pipeline's store and model default to the
/// production Postgres store and chat-completions client.
pub struct AppState<S = PgInsightStore, M = ChatCompletionsModel> {
    pub db: PgPool,
    pub pipeline: Arc<InsightPipeline<S, M>>,
}

impl<S, M> Clone for AppState<S, M> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}
