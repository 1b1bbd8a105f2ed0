use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod extract;
mod identity;
mod insights;
mod middleware;
mod routes;
mod state;

use crate::config::AppConfig;
use crate::insights::InsightPipeline;
use crate::insights::model::ChatCompletionsModel;
use crate::insights::store::PgInsightStore;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vitals Insights API",
        version = "0.1.0",
        description = "Turns completed health assessments into AI-generated reports, prioritized recommendations and notifications."
    ),
    paths(
        routes::health::health_check,
        routes::insights::generate_insights,
        routes::insights::get_report,
        routes::insights::list_recommendations,
        routes::notifications::list_notifications,
        routes::notifications::mark_notification_read,
    ),
    components(schemas(
        routes::health::HealthResponse,
        vitals_core::error::ApiError,
        vitals_core::category::RecommendationCategory,
        vitals_core::insights::Priority,
        vitals_core::insights::Scorecard,
        vitals_core::insights::ReportData,
        vitals_core::insights::Report,
        vitals_core::insights::Recommendation,
        vitals_core::insights::GenerateInsightsRequest,
        vitals_core::insights::GenerateInsightsResponse,
        vitals_core::insights::RecommendationListResponse,
        vitals_core::notifications::NotificationType,
        vitals_core::notifications::Notification,
        vitals_core::notifications::NotificationListResponse,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "subject_header",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "x-subject-id",
                "Subject id set by the identity gateway (name configurable via VITALS_IDENTITY_HEADER)",
            ))),
        );
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitals_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let model = ChatCompletionsModel::new(&config.model).expect("Failed to build model client");
    tracing::info!(
        model = %config.model.model,
        endpoint = %config.model.endpoint,
        timeout_secs = config.model.timeout.as_secs(),
        "Insight model configured"
    );

    let app_state = state::AppState {
        db: pool.clone(),
        pipeline: Arc::new(InsightPipeline::new(
            PgInsightStore::new(pool),
            model,
            config.model.timeout,
        )),
    };

    let cors_layer =
        middleware::cors::build_cors_layer(&config.cors_origins, &config.identity_header);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router::<PgInsightStore, ChatCompletionsModel>())
        .merge(routes::insights::router::<PgInsightStore, ChatCompletionsModel>())
        .merge(routes::notifications::router::<PgInsightStore, ChatCompletionsModel>())
        .layer(identity::InjectIdentityLayer::new(
            config.identity_header.clone(),
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Vitals API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
