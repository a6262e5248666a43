//! Resume handlers

use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use folio_core::ChatMode;
use folio_rag::{build_user_message, identity_block};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

const SUMMARY_QUESTION: &str = "Give a comprehensive, structured resume summary covering my \
background, skills, key projects, and career highlights.";

#[derive(Debug, Serialize, ToSchema)]
pub struct ResumeSummary {
    pub name: String,
    pub summary: String,
    pub download_url: Option<String>,
    pub view_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LinkUnavailable {
    pub message: String,
}

fn redirect_or_404(url: Option<&str>, what: &str) -> Response {
    match url.filter(|u| !u.trim().is_empty()) {
        Some(url) => Redirect::temporary(url).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(LinkUnavailable {
                message: format!(
                    "Resume {what} link not configured. Please contact me directly."
                ),
            }),
        )
            .into_response(),
    }
}

/// Redirect to the resume download
#[utoipa::path(
    get,
    path = "/api/v1/resume/download",
    tag = "resume",
    responses(
        (status = 307, description = "Redirect to the configured download URL"),
        (status = 404, description = "No download URL configured", body = LinkUnavailable)
    )
)]
pub async fn resume_download(State(state): State<Arc<AppState>>) -> Response {
    redirect_or_404(
        state.config().profile.resume_download_url.as_deref(),
        "download",
    )
}

/// Redirect to the hosted resume view
#[utoipa::path(
    get,
    path = "/api/v1/resume/view",
    tag = "resume",
    responses(
        (status = 307, description = "Redirect to the configured view URL"),
        (status = 404, description = "No view URL configured", body = LinkUnavailable)
    )
)]
pub async fn resume_view(State(state): State<Arc<AppState>>) -> Response {
    redirect_or_404(state.config().profile.resume_view_url.as_deref(), "view")
}

/// Generated resume summary from the profile record
#[utoipa::path(
    get,
    path = "/api/v1/resume/summary",
    tag = "resume",
    responses(
        (status = 200, description = "Generated summary", body = ResumeSummary)
    )
)]
pub async fn resume_summary(State(state): State<Arc<AppState>>) -> Json<ResumeSummary> {
    state.increment_requests();
    let portfolio = state.portfolio();
    let chat = state.chat();

    let system = chat.guard().system_prompt(ChatMode::Hr);
    let user = build_user_message(&identity_block(portfolio), &[], SUMMARY_QUESTION);
    let summary = chat.responder().complete(&system, &user).await;

    let profile = &state.config().profile;
    Json(ResumeSummary {
        name: portfolio.identity.display_name().to_string(),
        summary,
        download_url: profile.resume_download_url.clone(),
        view_url: profile.resume_view_url.clone(),
    })
}
