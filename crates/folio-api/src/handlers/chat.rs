//! Chat handlers
//!
//! Both endpoints run the sanitizer first, then hand the cleaned query to the
//! chat service, which applies the off-topic redirect, retrieval and the
//! persona prompt. `/chat` streams `{"type", "data"}` events over SSE.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use folio_core::{ChatMode, StreamEvent};
use folio_rag::context_sources;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Sources reported by the sync endpoint
const MAX_CONTEXT_SOURCES: usize = 5;

/// Chat request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// Visitor's question
    #[schema(example = "What did you build with Rust?")]
    pub query: String,

    /// Answering persona
    #[serde(default)]
    #[schema(value_type = String, example = "hr")]
    pub mode: ChatMode,

    /// Opaque conversation identifier, echoed back
    pub session_id: Option<String>,
}

/// Sync chat response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
    #[schema(value_type = String)]
    pub mode: ChatMode,
    pub session_id: String,
    /// Distinct context labels, at most five
    pub context_sources: Vec<String>,
}

fn clean_query(state: &AppState, query: &str) -> Result<String, AppError> {
    state
        .sanitizer()
        .sanitize(query)
        .map_err(|e| AppError::RejectedQuery(e.to_string()))
}

fn sse_event(event: StreamEvent) -> Result<Event, axum::Error> {
    Event::default().json_data(event)
}

/// Streaming chat
#[utoipa::path(
    post,
    path = "/api/v1/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Server-sent token stream ending with a done or error event"),
        (status = 400, description = "Query rejected", body = crate::error::ApiError)
    )
)]
pub async fn chat_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();
    let query = clean_query(&state, &req.query)?;
    tracing::debug!("Streaming chat ({}): {} chars", req.mode, query.chars().count());

    let events = state.chat().answer_stream(&query, req.mode).await;
    let sse = Sse::new(events.map(sse_event)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    );

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    ))
}

/// Non-streaming chat
#[utoipa::path(
    post,
    path = "/api/v1/chat/sync",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Complete answer", body = ChatResponse),
        (status = 400, description = "Query rejected", body = crate::error::ApiError)
    )
)]
pub async fn chat_sync_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    state.increment_requests();
    let query = clean_query(&state, &req.query)?;

    let reply = state.chat().answer(&query, req.mode).await;
    let mut sources = context_sources(&reply.context);
    sources.truncate(MAX_CONTEXT_SOURCES);

    Ok(Json(ChatResponse {
        response: reply.response,
        mode: req.mode,
        session_id: req
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        context_sources: sources,
    }))
}
