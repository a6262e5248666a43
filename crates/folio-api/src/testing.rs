//! In-process fixtures for router tests
//!
//! The router gets a small profile record, the local hashing embedder, no
//! repository host and a scripted completion client, so no test touches the
//! network.

use crate::state::AppState;
use crate::create_router;
use async_trait::async_trait;
use axum::extract::ConnectInfo;
use axum::Extension;
use axum::Router;
use folio_core::config::{AppConfig, EmbeddingProvider};
use folio_core::profile::{Identity, Project};
use folio_core::{LlmClient, Portfolio, Result};
use folio_rag::{FolioRuntime, PersonaGuard, Responder};
use folio_vector::HashingEmbedding;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Answer returned by [`ScriptedLlm`]
pub const SCRIPTED_ANSWER: &str = "I build retrieval systems in Rust.";

/// Completion client with a fixed answer, streamed word by word
pub struct ScriptedLlm;

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        Ok(SCRIPTED_ANSWER.to_string())
    }

    async fn generate_stream(
        &self,
        _system: &str,
        _user: &str,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let tokens: Vec<Result<String>> = SCRIPTED_ANSWER
            .split_inclusive(' ')
            .map(|t| Ok(t.to_string()))
            .collect();
        Ok(stream::iter(tokens).boxed())
    }
}

pub fn sample_portfolio() -> Portfolio {
    let mut skills = BTreeMap::new();
    skills.insert(
        "backend".to_string(),
        vec!["Rust".to_string(), "Go".to_string(), "PostgreSQL".to_string()],
    );

    Portfolio {
        identity: Identity {
            name: "Ava".to_string(),
            full_name: "Ava Lindqvist".to_string(),
            tagline: "Platform Engineer".to_string(),
            summary: "Builds search and retrieval infrastructure.".to_string(),
            ..Default::default()
        },
        skills,
        projects: vec![
            Project {
                name: "Folio Bot".to_string(),
                description: "Answers questions about my work".to_string(),
                tech_stack: vec!["Rust".to_string(), "axum".to_string()],
                github_url: "https://github.com/ava/folio-bot".to_string(),
                ..Default::default()
            },
            Project {
                name: "Trace Lens".to_string(),
                slug: "lens".to_string(),
                description: "Distributed tracing viewer".to_string(),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

/// Configuration rooted in a fresh scratch directory, with a download link set
pub fn test_config() -> AppConfig {
    let root = std::env::temp_dir().join(format!("folio-api-test-{}", uuid::Uuid::new_v4()));
    let mut config = AppConfig::default();
    config.paths.portfolio_json = root.join("portfolio.json");
    config.paths.resume = root.join("resume.txt");
    config.paths.indexes_dir = root.join("indexes");
    config.paths.prompts_dir = root.join("prompts");
    config.profile.resume_download_url = Some("https://example.com/ava-resume.pdf".to_string());
    config.embedding.provider = EmbeddingProvider::Hashing;
    config
}

/// State over `portfolio`, not yet initialized
pub fn create_test_state(config: AppConfig, portfolio: Portfolio) -> Arc<AppState> {
    let embedder = Arc::new(HashingEmbedding::new(config.embedding.dimension));
    let guard = PersonaGuard::with_defaults(&config.rag).expect("default persona guard");
    let runtime = FolioRuntime::assemble(
        config,
        portfolio,
        embedder,
        None,
        guard,
        Responder::new(Arc::new(ScriptedLlm)),
    );
    Arc::new(AppState::new(runtime).expect("state"))
}

/// Peer address seen by routers built here
pub const TEST_PEER: ([u8; 4], u16) = ([127, 0, 0, 1], 40_000);

/// Router over `state` with a fixed peer address, as `serve` would attach
pub fn router_with_peer(state: Arc<AppState>) -> Router {
    create_router(state).layer(Extension(ConnectInfo(SocketAddr::from(TEST_PEER))))
}

/// Router over the sample profile with its indexes built and readiness set
pub async fn create_router_for_testing() -> Router {
    let state = create_test_state(test_config(), sample_portfolio());
    state.initialize().await.expect("index build");
    router_with_peer(state)
}
