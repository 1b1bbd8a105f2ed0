use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use vitals_core::error::ApiError;
use vitals_core::insights::{
    GenerateInsightsRequest, GenerateInsightsResponse, RecommendationListResponse, Report,
};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::identity::CallerIdentity;
use crate::insights::model::InsightModel;
use crate::insights::store::InsightStore;
use crate::state::AppState;

pub fn router<S, M>() -> Router<AppState<S, M>>
where
    S: InsightStore + 'static,
    M: InsightModel + 'static,
{
    Router::new()
        .route("/v1/insights/generate", post(generate_insights::<S, M>))
        .route("/v1/assessments/{assessment_id}/report", get(get_report::<S, M>))
        .route("/v1/recommendations", get(list_recommendations::<S, M>))
}

/// Generate a report and recommendations for one of the caller's assessments
///
/// Calls the insight model, then replaces the assessment's report and the
/// caller's whole recommendation set in one commit. Medium and high
/// priority recommendations also produce notifications; a notification
/// failure never fails this request.
#[utoipa::path(
    post,
    path = "/v1/insights/generate",
    request_body = GenerateInsightsRequest,
    responses(
        (status = 201, description = "Insights generated and stored", body = GenerateInsightsResponse),
        (status = 400, description = "Missing or malformed assessmentReference", body = ApiError),
        (status = 401, description = "No caller identity", body = ApiError),
        (status = 404, description = "Unknown user or assessment", body = ApiError),
        (status = 500, description = "Model unavailable or returned unusable content", body = ApiError)
    ),
    security(("subject_header" = [])),
    tag = "insights"
)]
pub async fn generate_insights<S: InsightStore, M: InsightModel>(
    State(state): State<AppState<S, M>>,
    identity: CallerIdentity,
    AppJson(req): AppJson<GenerateInsightsRequest>,
) -> Result<(StatusCode, Json<GenerateInsightsResponse>), AppError> {
    let response = state
        .pipeline
        .generate_insights(&identity.subject, req.assessment_reference.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Fetch the stored report for one of the caller's assessments
#[utoipa::path(
    get,
    path = "/v1/assessments/{assessment_id}/report",
    params(
        ("assessment_id" = Uuid, Path, description = "Assessment the report was generated for")
    ),
    responses(
        (status = 200, description = "Stored report", body = Report),
        (status = 401, description = "No caller identity", body = ApiError),
        (status = 404, description = "No report for this assessment", body = ApiError)
    ),
    security(("subject_header" = [])),
    tag = "insights"
)]
pub async fn get_report<S: InsightStore, M: InsightModel>(
    State(state): State<AppState<S, M>>,
    identity: CallerIdentity,
    Path(assessment_id): Path<Uuid>,
) -> Result<Json<Report>, AppError> {
    let report = state
        .pipeline
        .report_for(&identity.subject, assessment_id)
        .await?;
    Ok(Json(report))
}

/// The caller's current recommendation set (from the latest generation)
#[utoipa::path(
    get,
    path = "/v1/recommendations",
    responses(
        (status = 200, description = "Current recommendations", body = RecommendationListResponse),
        (status = 401, description = "No caller identity", body = ApiError),
        (status = 404, description = "Unknown user", body = ApiError)
    ),
    security(("subject_header" = [])),
    tag = "insights"
)]
pub async fn list_recommendations<S: InsightStore, M: InsightModel>(
    State(state): State<AppState<S, M>>,
    identity: CallerIdentity,
) -> Result<Json<RecommendationListResponse>, AppError> {
    let recommendations = state
        .pipeline
        .recommendations_for(&identity.subject)
        .await?;
    Ok(Json(RecommendationListResponse { recommendations }))
}
