//! Folio API - HTTP surface of the portfolio assistant
//!
//! Thin plumbing over `folio-rag`: health and readiness probes, streaming and
//! sync chat, project listing and explanation, and resume links.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod sanitizer;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use axum::{http::HeaderValue, routing::get, Json, Router};
use handlers::{chat, health, projects, resume};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[cfg(any(test, feature = "test-utils"))]
pub use testing::create_router_for_testing;

#[derive(OpenApi)]
#[openapi(
    info(title = "Folio API", description = "Portfolio assistant over retrieval-augmented generation"),
    paths(
        health::health_check,
        health::readiness_check,
        chat::chat_stream_handler,
        chat::chat_sync_handler,
        projects::list_projects,
        projects::get_project,
        projects::explain_project,
        resume::resume_summary,
        resume::resume_download,
        resume::resume_view,
    ),
    components(schemas(
        error::ApiError,
        health::HealthResponse,
        health::ReadinessResponse,
        health::IndexCounts,
        chat::ChatRequest,
        chat::ChatResponse,
        projects::ProjectSummary,
        projects::ProjectListResponse,
        projects::ProjectDetailResponse,
        projects::ProjectExplanation,
        resume::ResumeSummary,
        resume::LinkUnavailable,
    )),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "chat", description = "Questions about the profile"),
        (name = "projects", description = "Project catalogue"),
        (name = "resume", description = "Resume links and summary")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// CORS from the configured origins; an empty list allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let server = &state.config().server;
    let cors = cors_layer(&server.cors_origins);
    let timeout = TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs));

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", routes::api_routes(&state.config().rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(timeout),
        )
        .with_state(state)
}
