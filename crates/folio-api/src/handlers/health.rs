//! Health check handlers

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Service banner
#[derive(Serialize, ToSchema)]
pub struct RootResponse {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

pub async fn root() -> impl IntoResponse {
    let endpoints = [
        "POST /api/v1/chat",
        "POST /api/v1/chat/sync",
        "GET /api/v1/projects",
        "GET /api/v1/projects/{slug}",
        "GET /api/v1/projects/{slug}/explain",
        "GET /api/v1/resume/summary",
        "GET /api/v1/resume/download",
        "GET /api/v1/resume/view",
        "GET /health",
        "GET /ready",
        "GET /api-docs/openapi.json",
    ];
    Json(RootResponse {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
    })
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now(),
    })
}

/// Vector counts per index
#[derive(Serialize, ToSchema)]
pub struct IndexCounts {
    pub portfolio_vectors: usize,
    pub resume_vectors: usize,
    pub repo_indexes: usize,
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    /// `ready` or `not_ready`
    pub status: String,
    pub indexes: IndexCounts,
    pub llm_configured: bool,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub timestamp: String,
}

/// Readiness probe - indexes built or loaded
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let sizes = state.indexes().sizes().await;

    let response = ReadinessResponse {
        status: if is_ready { "ready" } else { "not_ready" }.to_string(),
        indexes: IndexCounts {
            portfolio_vectors: sizes.portfolio,
            resume_vectors: sizes.resume,
            repo_indexes: sizes.repos,
        },
        llm_configured: state.chat().responder().is_configured(),
        uptime_seconds: state.uptime_secs(),
        total_requests: state.get_request_count(),
        timestamp: now(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
