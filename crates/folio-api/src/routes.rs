//! API route definitions

use crate::handlers::{chat, projects, resume};
use crate::rate_limit::{chat_rate_limit_config, GovernorLayer};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use folio_core::config::RateLimitConfig;
use std::sync::Arc;

/// Chat endpoints, behind the per-client limiter when it is enabled
fn chat_routes(limits: &RateLimitConfig) -> Router<Arc<AppState>> {
    let routes = Router::new()
        .route("/chat", post(chat::chat_stream_handler))
        .route("/chat/sync", post(chat::chat_sync_handler));

    match chat_rate_limit_config(limits) {
        Some(config) => routes.layer(GovernorLayer { config }),
        None => routes,
    }
}

/// Create API v1 routes
pub fn api_routes(limits: &RateLimitConfig) -> Router<Arc<AppState>> {
    Router::new()
        .merge(chat_routes(limits))
        // Project endpoints
        .route("/projects", get(projects::list_projects))
        .route("/projects/:slug", get(projects::get_project))
        .route("/projects/:slug/explain", get(projects::explain_project))
        // Resume endpoints
        .route("/resume/summary", get(resume::resume_summary))
        .route("/resume/download", get(resume::resume_download))
        .route("/resume/view", get(resume::resume_view))
}
