//! Registry of the portfolio, resume and per-repository indexes
//!
//! The portfolio and resume stores are swapped wholesale on rebuild, so
//! readers holding an `Arc<FlatStore>` keep searching the old one until
//! they drop it. Repository stores are built on demand and kept in an
//! unbounded moka cache with no expiry, so a built repository stays a hit
//! until `clear_repo_cache` or restart. Concurrent misses for the same
//! repository share one build.
//!
//! Layout under the indexes root:
//! - `portfolio/`
//! - `resume/`
//! - `github_cache/<owner>__<repo>/`

use crate::embedding::EmbeddingClient;
use crate::flat_store::{FlatStore, DEFAULT_SIMILARITY_FLOOR};
use folio_core::config::AppConfig;
use folio_core::{Chunk, FolioError, Result};
use folio_ingest::RepoFetcher;
use moka::future::Cache;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const PORTFOLIO_DIR: &str = "portfolio";
const RESUME_DIR: &str = "resume";
const REPO_CACHE_DIR: &str = "github_cache";

/// `owner/repo` -> `owner__repo`
pub fn encode_repo_id(id: &str) -> String {
    id.replace('/', "__")
}

/// `owner__repo` -> `owner/repo`
///
/// Every `__` decodes to `/`, so a repository whose name itself contains
/// `__` (`ava/my__tool`) reloads under a different identifier and is
/// fetched again on its next query.
pub fn decode_repo_id(name: &str) -> String {
    name.replace("__", "/")
}

/// Vector counts per index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSizes {
    pub portfolio: usize,
    pub resume: usize,
    pub repos: usize,
}

pub struct IndexManager {
    root: PathBuf,
    embedder: Arc<dyn EmbeddingClient>,
    similarity_floor: f32,
    portfolio: RwLock<Arc<FlatStore>>,
    resume: RwLock<Arc<FlatStore>>,
    repos: Cache<String, Arc<FlatStore>>,
}

impl IndexManager {
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        let dimension = embedder.dimension();
        Self {
            root: root.into(),
            embedder,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
            portfolio: RwLock::new(Arc::new(FlatStore::new(dimension))),
            resume: RwLock::new(Arc::new(FlatStore::new(dimension))),
            repos: Cache::builder().build(),
        }
    }

    pub fn from_config(config: &AppConfig, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self::new(config.paths.indexes_dir.clone(), embedder)
            .with_similarity_floor(config.rag.similarity_threshold)
    }

    pub fn with_similarity_floor(mut self, floor: f32) -> Self {
        self.similarity_floor = floor;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingClient> {
        &self.embedder
    }

    fn repo_cache_root(&self) -> PathBuf {
        self.root.join(REPO_CACHE_DIR)
    }

    fn repo_dir(&self, id: &str) -> PathBuf {
        self.repo_cache_root().join(encode_repo_id(id))
    }

    fn empty_store(&self) -> FlatStore {
        FlatStore::new(self.embedder.dimension()).with_similarity_floor(self.similarity_floor)
    }

    /// Snapshot of the current portfolio store
    pub async fn portfolio(&self) -> Arc<FlatStore> {
        self.portfolio.read().await.clone()
    }

    /// Snapshot of the current resume store
    pub async fn resume(&self) -> Arc<FlatStore> {
        self.resume.read().await.clone()
    }

    /// Whether a portfolio index has been saved under the root
    pub fn has_persisted_portfolio(&self) -> bool {
        FlatStore::exists(&self.root.join(PORTFOLIO_DIR))
    }

    /// Load a persisted store, checking it against the embedder
    fn load_store(&self, dir: &Path) -> Result<FlatStore> {
        let store = FlatStore::load(dir)?.with_similarity_floor(self.similarity_floor);
        if store.dimension() != self.embedder.dimension() {
            return Err(FolioError::InvariantViolation(format!(
                "{} holds {}-dimensional vectors, embedder produces {}",
                dir.display(),
                store.dimension(),
                self.embedder.dimension()
            )));
        }
        Ok(store)
    }

    fn load_or_empty(&self, name: &str) -> Result<FlatStore> {
        match self.load_store(&self.root.join(name)) {
            Ok(store) => {
                tracing::info!("Loaded {} index: {} vectors", name, store.size());
                Ok(store)
            }
            Err(FolioError::NotFound(_)) => {
                tracing::warn!("No persisted {} index, starting empty", name);
                Ok(self.empty_store())
            }
            Err(e) => Err(e),
        }
    }

    /// Load every persisted index from disk
    ///
    /// Missing portfolio or resume indexes are replaced by empty stores,
    /// corrupted ones are returned as an error. A repository cache entry
    /// that fails to load is skipped; it is rebuilt on its next query.
    pub async fn load_all(&self) -> Result<()> {
        let portfolio = self.load_or_empty(PORTFOLIO_DIR)?;
        let resume = self.load_or_empty(RESUME_DIR)?;
        *self.portfolio.write().await = Arc::new(portfolio);
        *self.resume.write().await = Arc::new(resume);

        let cache_root = self.repo_cache_root();
        if !cache_root.is_dir() {
            return Ok(());
        }

        let mut loaded = 0;
        for entry in std::fs::read_dir(&cache_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.load_store(&entry.path()) {
                Ok(store) => {
                    self.repos.insert(decode_repo_id(&name), Arc::new(store)).await;
                    loaded += 1;
                }
                Err(FolioError::NotFound(_)) => {
                    tracing::debug!("Skipping empty cache directory {}", name);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable repository index {}: {}", name, e);
                }
            }
        }
        tracing::info!("Loaded {} cached repository indexes", loaded);
        Ok(())
    }

    async fn build_store(&self, chunks: Vec<Chunk>) -> Result<FlatStore> {
        let mut store = self.empty_store();
        store.add(chunks, self.embedder.as_ref()).await?;
        Ok(store)
    }

    /// Rebuild, persist and publish the portfolio index
    pub async fn build_portfolio_index(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let store = self.build_store(chunks).await?;
        store.save(&self.root.join(PORTFOLIO_DIR))?;
        let size = store.size();
        *self.portfolio.write().await = Arc::new(store);
        tracing::info!("Portfolio index built: {} vectors", size);
        Ok(size)
    }

    /// Rebuild, persist and publish the resume index
    pub async fn build_resume_index(&self, chunks: Vec<Chunk>) -> Result<usize> {
        let store = self.build_store(chunks).await?;
        store.save(&self.root.join(RESUME_DIR))?;
        let size = store.size();
        *self.resume.write().await = Arc::new(store);
        tracing::info!("Resume index built: {} vectors", size);
        Ok(size)
    }

    /// Build and persist a repository store without publishing it
    async fn build_repo_store(&self, id: &str, chunks: Vec<Chunk>) -> Result<Arc<FlatStore>> {
        let store = self.build_store(chunks).await?;
        // The in-memory store stays usable when the cache directory is not writable
        if let Err(e) = store.save(&self.repo_dir(id)) {
            tracing::warn!("Failed to persist repository index {}: {}", id, e);
        }
        tracing::info!("Repository index built for {}: {} vectors", id, store.size());
        Ok(Arc::new(store))
    }

    /// Build, persist and register a repository index
    ///
    /// An empty chunk list still registers an empty store, which later
    /// lookups treat as a hit.
    pub async fn build_repo_index(&self, id: &str, chunks: Vec<Chunk>) -> Result<Arc<FlatStore>> {
        let store = self.build_repo_store(id, chunks).await?;
        self.repos.insert(id.to_string(), store.clone()).await;
        Ok(store)
    }

    /// Pure lookup, never fetches
    pub async fn get_repo_index(&self, id: &str) -> Option<Arc<FlatStore>> {
        self.repos.get(id).await
    }

    /// Cached repository index, fetching and building it on a miss
    ///
    /// Concurrent callers missing the same identifier wait on a single
    /// fetch. A failed build is not cached.
    pub async fn get_or_build_repo_index(
        &self,
        id: &str,
        fetcher: &RepoFetcher,
    ) -> Result<Arc<FlatStore>> {
        self.repos
            .try_get_with(id.to_string(), async {
                tracing::info!("Repository index miss for {}, fetching", id);
                let chunks = fetcher.fetch_chunks(id).await;
                self.build_repo_store(id, chunks).await
            })
            .await
            .map_err(|e: Arc<FolioError>| {
                FolioError::Other(anyhow::anyhow!("repository index for {id}: {e}"))
            })
    }

    /// Identifiers of every cached repository index, sorted
    pub fn repo_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.repos.iter().map(|(k, _)| k.to_string()).collect();
        ids.sort();
        ids
    }

    /// Drop every repository index from memory and disk
    pub async fn clear_repo_cache(&self) -> Result<()> {
        self.repos.invalidate_all();
        self.repos.run_pending_tasks().await;

        let cache_root = self.repo_cache_root();
        if cache_root.exists() {
            std::fs::remove_dir_all(&cache_root)?;
        }
        tracing::info!("Repository index cache cleared");
        Ok(())
    }

    pub async fn sizes(&self) -> IndexSizes {
        IndexSizes {
            portfolio: self.portfolio().await.size(),
            resume: self.resume().await.size(),
            repos: self.repos.iter().count(),
        }
    }
}
