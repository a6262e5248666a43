//! Wiring the retrieval stack from configuration
//!
//! Both binaries go through [`FolioRuntime`]: it loads the profile record,
//! creates the embedder, index registry, repository fetcher, persona guard and
//! responder, and decides at startup whether to build or load the indexes.

use crate::chat::ChatService;
use crate::guard::PersonaGuard;
use crate::llm::Responder;
use crate::RagEngine;
use folio_core::config::AppConfig;
use folio_core::{FolioError, Portfolio, Result};
use folio_ingest::{
    load_resume_chunks, portfolio_chunks, Chunker, FetchLimits, GitHubClient, RepoFetcher,
    RepoHost,
};
use folio_vector::{create_embedding_client, EmbeddingClient, IndexManager, IndexSizes};
use std::path::Path;
use std::sync::Arc;

/// Load the profile record, or an empty one when the file does not exist
pub fn load_portfolio(path: &Path) -> Result<Portfolio> {
    match Portfolio::load(path) {
        Ok(portfolio) => {
            tracing::info!(
                "Loaded profile record from {} ({} projects)",
                path.display(),
                portfolio.projects.len()
            );
            Ok(portfolio)
        }
        Err(FolioError::NotFound(_)) => {
            tracing::warn!(
                "Profile record not found at {}, continuing with an empty profile",
                path.display()
            );
            Ok(Portfolio::default())
        }
        Err(e) => Err(e),
    }
}

/// Chunk and embed the profile record and resume into fresh base indexes
pub async fn build_base_indexes(
    indexes: &IndexManager,
    portfolio: &Portfolio,
    resume: &Path,
) -> Result<IndexSizes> {
    let chunker = Chunker::new();

    let portfolio_count = indexes
        .build_portfolio_index(portfolio_chunks(portfolio, &chunker))
        .await?;
    let resume_count = indexes
        .build_resume_index(load_resume_chunks(resume, &chunker))
        .await?;

    tracing::info!(
        "Base indexes built: portfolio {} vectors, resume {} vectors",
        portfolio_count,
        resume_count
    );
    Ok(indexes.sizes().await)
}

/// Shared handles for one running instance
pub struct FolioRuntime {
    config: AppConfig,
    portfolio: Arc<Portfolio>,
    indexes: Arc<IndexManager>,
    chat: Arc<ChatService>,
}

impl FolioRuntime {
    /// Assemble every component from configuration. No index work happens here.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let portfolio = load_portfolio(&config.paths.portfolio_json)?;
        let embedder = create_embedding_client(&config);
        let host: Arc<dyn RepoHost> = Arc::new(GitHubClient::from_config(&config.github)?);
        let guard = PersonaGuard::load(&config.paths.prompts_dir, &config.rag)?;
        let responder = Responder::from_config(&config.llm);

        Ok(Self::assemble(
            config,
            portfolio,
            embedder,
            Some(host),
            guard,
            responder,
        ))
    }

    /// Assemble from explicit parts. Without a host, repository lookups are cache-only.
    pub fn assemble(
        config: AppConfig,
        portfolio: Portfolio,
        embedder: Arc<dyn EmbeddingClient>,
        host: Option<Arc<dyn RepoHost>>,
        guard: PersonaGuard,
        responder: Responder,
    ) -> Self {
        let portfolio = Arc::new(portfolio);
        let indexes = Arc::new(IndexManager::from_config(&config, embedder));

        let mut engine = RagEngine::new(indexes.clone(), portfolio.clone(), config.rag.clone());
        if let Some(host) = host {
            let fetcher = RepoFetcher::new(host).with_limits(FetchLimits::from(&config.github));
            engine = engine.with_fetcher(fetcher);
        }

        let chat = ChatService::new(Arc::new(engine), Arc::new(guard), responder);
        Self {
            config,
            portfolio,
            indexes,
            chat: Arc::new(chat),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &Arc<Portfolio> {
        &self.portfolio
    }

    pub fn indexes(&self) -> &Arc<IndexManager> {
        &self.indexes
    }

    pub fn chat(&self) -> &Arc<ChatService> {
        &self.chat
    }

    pub fn engine(&self) -> &Arc<RagEngine> {
        self.chat.engine()
    }

    /// Build the base indexes when none are persisted, otherwise load everything from disk
    pub async fn start(&self) -> Result<IndexSizes> {
        if self.indexes.has_persisted_portfolio() {
            self.indexes.load_all().await?;
            let sizes = self.indexes.sizes().await;
            tracing::info!(
                "Indexes loaded: portfolio {}, resume {}, repositories {}",
                sizes.portfolio,
                sizes.resume,
                sizes.repos
            );
            Ok(sizes)
        } else {
            tracing::info!("No persisted portfolio index, building from sources");
            self.rebuild().await
        }
    }

    /// Rebuild the base indexes from the configured sources
    pub async fn rebuild(&self) -> Result<IndexSizes> {
        build_base_indexes(&self.indexes, &self.portfolio, &self.config.paths.resume).await
    }

    /// Drop every repository index, then rebuild the base indexes
    pub async fn refresh(&self) -> Result<IndexSizes> {
        self.indexes.clear_repo_cache().await?;
        self.rebuild().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{Chunk, ChunkType};
    use folio_vector::HashingEmbedding;
    use std::path::PathBuf;

    const PROFILE: &str = r#"{
        "identity": {"name": "Ava", "tagline": "Platform Engineer"},
        "skills": {"backend": ["Rust", "Go"]},
        "projects": [{"name": "Folio Bot", "description": "Answers questions about me"}]
    }"#;

    fn config(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.paths.portfolio_json = root.join("portfolio.json");
        config.paths.resume = root.join("resume.txt");
        config.paths.indexes_dir = root.join("indexes");
        config.paths.prompts_dir = root.join("prompts");
        config
    }

    fn runtime(config: AppConfig) -> FolioRuntime {
        let portfolio = load_portfolio(&config.paths.portfolio_json).unwrap();
        let guard = PersonaGuard::with_defaults(&config.rag).unwrap();
        let embedder = Arc::new(HashingEmbedding::new(config.embedding.dimension));
        FolioRuntime::assemble(
            config,
            portfolio,
            embedder,
            None,
            guard,
            Responder::unconfigured(),
        )
    }

    #[test]
    fn test_missing_profile_is_empty() {
        let portfolio = load_portfolio(&PathBuf::from("/nonexistent/portfolio.json")).unwrap();
        assert_eq!(portfolio, Portfolio::default());
    }

    #[test]
    fn test_malformed_profile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_portfolio(&path).is_err());
    }

    #[tokio::test]
    async fn test_start_builds_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("portfolio.json"), PROFILE).unwrap();
        std::fs::write(dir.path().join("resume.txt"), "SKILLS\nRust, Go, Kubernetes\n").unwrap();

        let first = runtime(config(dir.path()));
        assert!(!first.indexes().has_persisted_portfolio());
        let built = first.start().await.unwrap();
        assert!(built.portfolio > 0);
        assert_eq!(built.resume, 1);
        assert!(first.indexes().has_persisted_portfolio());

        // Sources changed on disk, but a restart loads what was persisted
        std::fs::write(dir.path().join("resume.txt"), "").unwrap();
        let second = runtime(config(dir.path()));
        assert_eq!(second.start().await.unwrap(), built);
    }

    #[tokio::test]
    async fn test_missing_resume_builds_empty_resume_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("portfolio.json"), PROFILE).unwrap();

        let sizes = runtime(config(dir.path())).rebuild().await.unwrap();
        assert!(sizes.portfolio > 0);
        assert_eq!(sizes.resume, 0);
    }

    #[tokio::test]
    async fn test_refresh_clears_repositories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("portfolio.json"), PROFILE).unwrap();
        let runtime = runtime(config(dir.path()));

        let chunk = Chunk::new(
            "fn main() {}",
            "github/ava/folio-bot/src/main.rs",
            ChunkType::Code,
        )
        .unwrap();
        runtime
            .indexes()
            .build_repo_index("ava/folio-bot", vec![chunk])
            .await
            .unwrap();
        assert_eq!(runtime.indexes().sizes().await.repos, 1);

        let sizes = runtime.refresh().await.unwrap();
        assert_eq!(sizes.repos, 0);
        assert!(sizes.portfolio > 0);
    }
}
