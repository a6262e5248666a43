//! Folio RAG - Retrieval orchestrator
//!
//! [`RagEngine::retrieve`] embeds a query once, searches the portfolio and
//! resume indexes, and when the query names a known project also searches
//! (building on first use) that project's repository index. Repository hits
//! are placed ahead of the base hits, then the merged list is deduplicated,
//! formatted and capped to the context budget.
//!
//! Retrieval never fails: every error degrades to fewer or no results.

use folio_core::{ChatMode, Portfolio, RagConfig, SearchResult};
use folio_ingest::RepoFetcher;
use folio_vector::{FlatStore, IndexManager};
use std::sync::Arc;

pub mod bootstrap;
pub mod chat;
pub mod context;
pub mod guard;
pub mod llm;

pub use bootstrap::{build_base_indexes, load_portfolio, FolioRuntime};
pub use chat::{ChatReply, ChatService, PreparedChat};
pub use context::{assemble, cap_to_budget, context_sources, dedup_by_text, format_result};
pub use guard::{
    build_user_message, identity_block, OffTopicClassifier, PersonaGuard, ProjectDetector,
    SubstringProjectDetector, REDIRECT_MESSAGE,
};
pub use llm::{
    canned_stream, create_llm_client, OllamaClient, OpenAiClient, Responder, APOLOGY,
    STREAM_INTERRUPTED,
};

/// Retrieval over the index registry
pub struct RagEngine {
    indexes: Arc<IndexManager>,
    portfolio: Arc<Portfolio>,
    /// Repository indexes are only built when a fetcher is present
    fetcher: Option<RepoFetcher>,
    detector: Arc<dyn ProjectDetector>,
    config: RagConfig,
}

impl RagEngine {
    pub fn new(indexes: Arc<IndexManager>, portfolio: Arc<Portfolio>, config: RagConfig) -> Self {
        Self {
            indexes,
            portfolio,
            fetcher: None,
            detector: Arc::new(SubstringProjectDetector),
            config,
        }
    }

    pub fn with_fetcher(mut self, fetcher: RepoFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn ProjectDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn indexes(&self) -> &Arc<IndexManager> {
        &self.indexes
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Ordered, deduplicated, budget-capped context strings for `query`
    pub async fn retrieve(&self, query: &str, mode: ChatMode) -> Vec<String> {
        self.retrieve_with_top_k(query, mode, None).await
    }

    /// [`RagEngine::retrieve`] with an optional override of the portfolio top-k
    pub async fn retrieve_with_top_k(
        &self,
        query: &str,
        mode: ChatMode,
        top_k: Option<usize>,
    ) -> Vec<String> {
        let query_vector = match self.indexes.embedder().embed(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Query embedding failed, returning no context: {}", e);
                return Vec::new();
            }
        };

        let top_k = top_k.unwrap_or(self.config.top_k);
        let portfolio = search(&*self.indexes.portfolio().await, &query_vector, top_k, "portfolio");
        let resume = search(
            &*self.indexes.resume().await,
            &query_vector,
            self.config.resume_top_k,
            "resume",
        );

        let repo = match self.detector.detect(query, &self.portfolio) {
            Some(id) => {
                tracing::info!("Repository intelligence triggered: {}", id);
                self.search_repo(&id, &query_vector).await
            }
            None => Vec::new(),
        };

        let counts = (repo.len(), portfolio.len(), resume.len());
        let context = assemble(repo, portfolio, resume, self.config.context_char_budget());

        tracing::info!(
            "Retrieval complete ({}): {} context chunks (repo: {}, portfolio: {}, resume: {})",
            mode,
            context.len(),
            counts.0,
            counts.1,
            counts.2
        );
        context
    }

    async fn search_repo(&self, id: &str, query_vector: &[f32]) -> Vec<SearchResult> {
        let store = match &self.fetcher {
            Some(fetcher) => match self.indexes.get_or_build_repo_index(id, fetcher).await {
                Ok(store) => Some(store),
                Err(e) => {
                    tracing::warn!("Repository index for {} unavailable: {}", id, e);
                    None
                }
            },
            None => self.indexes.get_repo_index(id).await,
        };

        match store {
            Some(store) => search(&store, query_vector, self.config.repo_top_k, id),
            None => Vec::new(),
        }
    }
}

fn search(store: &FlatStore, query: &[f32], k: usize, label: &str) -> Vec<SearchResult> {
    match store.search(query, k) {
        Ok(results) => {
            tracing::debug!("{} search returned {} results", label, results.len());
            results
        }
        Err(e) => {
            tracing::warn!("{} search failed: {}", label, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folio_core::profile::Project;
    use folio_core::{Chunk, ChunkType, FolioError, Result};
    use folio_ingest::{FetchLimits, RepoHost, TreeEntry};
    use folio_vector::{EmbeddingClient, HashingEmbedding};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const DIM: usize = 256;

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingClient for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(FolioError::Embedding("offline".to_string()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(FolioError::Embedding("offline".to_string()))
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    /// Serves one README; counts fetches and can stall past the deadline
    struct Host {
        readme: String,
        calls: AtomicUsize,
        stall: bool,
    }

    #[async_trait]
    impl RepoHost for Host {
        async fn readme(&self, _repo: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Some(self.readme.clone())
        }

        async fn tree(&self, _repo: &str) -> Vec<TreeEntry> {
            Vec::new()
        }

        async fn file(&self, _repo: &str, _path: &str) -> Option<String> {
            None
        }
    }

    fn chunk(text: &str, source: &str) -> Chunk {
        Chunk::new(text, source, ChunkType::Prose).unwrap()
    }

    fn portfolio() -> Arc<Portfolio> {
        Arc::new(Portfolio {
            projects: vec![Project {
                name: "Folio Bot".to_string(),
                github_repo: "ava/folio-bot".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    async fn indexes(dir: &std::path::Path) -> Arc<IndexManager> {
        let manager = IndexManager::new(dir, Arc::new(HashingEmbedding::new(DIM)));
        manager
            .build_portfolio_index(vec![
                chunk("rust systems engineer folio bot", "portfolio/identity"),
                chunk("rust systems engineer", "portfolio/skills"),
            ])
            .await
            .unwrap();
        manager
            .build_resume_index(vec![chunk("rust systems engineer", "resume/skills")])
            .await
            .unwrap();
        Arc::new(manager)
    }

    fn host(stall: bool) -> Arc<Host> {
        Arc::new(Host {
            readme: "folio bot rust systems engineer readme".to_string(),
            calls: AtomicUsize::new(0),
            stall,
        })
    }

    #[tokio::test]
    async fn test_retrieve_dedups_across_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RagEngine::new(indexes(dir.path()).await, portfolio(), RagConfig::default());

        let context = engine.retrieve("rust systems engineer", ChatMode::Hr).await;
        let sources = context_sources(&context);
        assert!(sources.contains(&"portfolio/skills".to_string()));
        // Identical resume text is dropped in favour of the portfolio copy
        assert!(!sources.contains(&"resume/skills".to_string()));
    }

    #[tokio::test]
    async fn test_repo_results_are_prepended_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(false);
        let engine = RagEngine::new(indexes(dir.path()).await, portfolio(), RagConfig::default())
            .with_fetcher(RepoFetcher::new(host.clone()));

        let context = engine.retrieve("what is folio bot written in?", ChatMode::Technical).await;
        assert!(context[0].starts_with("[github/ava/folio-bot/README.md]\n"));

        engine.retrieve("more about folio bot", ChatMode::Technical).await;
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);
        assert!(engine.indexes().get_repo_index("ava/folio-bot").await.is_some());
    }

    #[tokio::test]
    async fn test_repo_timeout_keeps_base_results() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RepoFetcher::new(host(true)).with_limits(FetchLimits {
            timeout: Duration::from_millis(50),
            ..Default::default()
        });
        let engine = RagEngine::new(indexes(dir.path()).await, portfolio(), RagConfig::default())
            .with_fetcher(fetcher);

        let context = engine.retrieve("folio bot rust systems engineer", ChatMode::Hr).await;
        assert!(!context.is_empty());
        assert!(context.iter().all(|c| !c.starts_with("[github/")));
    }

    #[tokio::test]
    async fn test_no_fetcher_means_cache_only() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RagEngine::new(indexes(dir.path()).await, portfolio(), RagConfig::default());

        let context = engine.retrieve("folio bot", ChatMode::Hr).await;
        assert!(context.iter().all(|c| !c.starts_with("[github/")));
        assert!(engine.indexes().get_repo_index("ava/folio-bot").await.is_none());
    }

    #[tokio::test]
    async fn test_budget_caps_context() {
        let dir = tempfile::tempdir().unwrap();
        let config = RagConfig {
            max_context_tokens: 10,
            chars_per_token: 4,
            ..Default::default()
        };
        let engine = RagEngine::new(indexes(dir.path()).await, portfolio(), config);

        let context = engine.retrieve("rust systems engineer", ChatMode::Hr).await;
        let total: usize = context.iter().map(|c| c.chars().count()).sum();
        assert!(total <= 40);
    }

    #[tokio::test]
    async fn test_embedding_failure_yields_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(IndexManager::new(dir.path(), Arc::new(FailingEmbedder)));
        let engine = RagEngine::new(manager, portfolio(), RagConfig::default());

        assert!(engine.retrieve("anything", ChatMode::Summary).await.is_empty());
    }
}
