//! Repository fetching
//!
//! [`RepoHost`] is the hosting API boundary: README, recursive file tree
//! and single-file contents. [`RepoFetcher`] turns those into chunks under
//! one overall deadline, keeping whatever it collected before a failure.

use crate::chunker::Chunker;
use crate::IngestError;
use async_trait::async_trait;
use base64::Engine;
use folio_core::config::GithubConfig;
use folio_core::{Chunk, FolioError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Extensions worth indexing
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".py", ".ts", ".js", ".go", ".rs", ".md", ".yaml", ".yml", ".json", ".sh", ".tsx", ".jsx",
];

/// Directories that never hold hand-written source
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    "dist",
    "build",
    ".next",
    "venv",
    "env",
    ".venv",
    "target",
];

/// One entry of a recursive file tree
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: "blob".to_string(),
            size: Some(size),
        }
    }

    fn depth(&self) -> usize {
        self.path.matches('/').count()
    }

    /// Extension without the leading dot
    pub fn extension(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[idx + 1..],
            _ => "",
        }
    }
}

// ============================================================================
// Hosting API boundary
// ============================================================================

/// Read operations against a code-hosting service
///
/// Implementations report non-success responses as absent/empty values.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// README text, if the repository has one
    async fn readme(&self, repo: &str) -> Option<String>;

    /// Every entry of the default branch tree
    async fn tree(&self, repo: &str) -> Vec<TreeEntry>;

    /// Decoded content of one file
    async fn file(&self, repo: &str, path: &str) -> Option<String>;
}

/// GitHub REST API client
pub struct GitHubClient {
    client: Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

/// Decode a base64 `contents` payload (GitHub wraps it at 60 columns)
pub fn decode_content(encoded: &str) -> Result<String, IngestError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| IngestError::Decode(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl GitHubClient {
    /// Create from config
    pub fn from_config(config: &GithubConfig) -> folio_core::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("folio-rag"));
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|e| FolioError::Config(format!("Invalid GitHub token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FolioError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Option<T> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("GitHub request failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("GitHub returned {} for {}", response.status(), url);
            return None;
        }

        match response.json::<T>().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!("Malformed GitHub response for {}: {}", url, e);
                None
            }
        }
    }

    async fn get_content(&self, url: &str) -> Option<String> {
        let body: ContentResponse = self.get_json(url).await?;
        match decode_content(body.content.as_deref()?) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Could not decode {}: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    async fn readme(&self, repo: &str) -> Option<String> {
        self.get_content(&format!("{}/repos/{repo}/readme", self.api_base))
            .await
    }

    async fn tree(&self, repo: &str) -> Vec<TreeEntry> {
        let url = format!("{}/repos/{repo}/git/trees/HEAD?recursive=1", self.api_base);
        match self.get_json::<TreeResponse>(&url).await {
            Some(tree) => {
                if tree.truncated {
                    tracing::debug!("Tree for {} was truncated by the API", repo);
                }
                tree.tree
            }
            None => Vec::new(),
        }
    }

    async fn file(&self, repo: &str, path: &str) -> Option<String> {
        self.get_content(&format!("{}/repos/{repo}/contents/{path}", self.api_base))
            .await
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Bounds on one repository fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_files: usize,
    pub max_file_bytes: u64,
    pub timeout: Duration,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self::from(&GithubConfig::default())
    }
}

impl From<&GithubConfig> for FetchLimits {
    fn from(config: &GithubConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_file_bytes: config.max_file_bytes,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Keep indexable blobs, shallow paths first, at most `max_files`
pub fn select_files(entries: Vec<TreeEntry>, limits: &FetchLimits) -> Vec<TreeEntry> {
    let mut files: Vec<TreeEntry> = entries
        .into_iter()
        .filter(|e| e.kind == "blob")
        .filter(|e| !e.path.split('/').any(|segment| SKIP_DIRS.contains(&segment)))
        .filter(|e| ALLOWED_EXTENSIONS.iter().any(|ext| e.path.ends_with(ext)))
        .filter(|e| e.size.unwrap_or(0) <= limits.max_file_bytes)
        .collect();

    files.sort_by(|a, b| a.depth().cmp(&b.depth()).then_with(|| a.path.cmp(&b.path)));
    files.truncate(limits.max_files);
    files
}

/// Builds repository chunks from a [`RepoHost`]
#[derive(Clone)]
pub struct RepoFetcher {
    host: Arc<dyn RepoHost>,
    chunker: Chunker,
    limits: FetchLimits,
}

impl RepoFetcher {
    pub fn new(host: Arc<dyn RepoHost>) -> Self {
        Self {
            host,
            chunker: Chunker::default(),
            limits: FetchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: FetchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Fetch and chunk a repository
    ///
    /// Never fails: a missing README, a failed file, or the deadline passing
    /// all leave the chunks gathered so far in place.
    pub async fn fetch_chunks(&self, repo: &str) -> Vec<Chunk> {
        let deadline = Instant::now() + self.limits.timeout;
        let mut chunks = Vec::new();

        match timeout_at(deadline, self.host.readme(repo)).await {
            Ok(Some(readme)) => {
                chunks.extend(
                    self.chunker
                        .chunk_markdown(&readme, &format!("github/{repo}/README.md")),
                );
            }
            Ok(None) => tracing::debug!("No README for {}", repo),
            Err(_) => {
                tracing::warn!("GitHub fetch timed out for {} (README)", repo);
                return chunks;
            }
        }

        let tree = match timeout_at(deadline, self.host.tree(repo)).await {
            Ok(tree) => tree,
            Err(_) => {
                tracing::warn!("GitHub fetch timed out for {} (tree)", repo);
                return chunks;
            }
        };

        for entry in select_files(tree, &self.limits) {
            if entry.path.ends_with(".md") {
                continue;
            }

            match timeout_at(deadline, self.host.file(repo, &entry.path)).await {
                Ok(Some(content)) => {
                    chunks.extend(self.chunker.chunk_code(
                        &content,
                        &format!("github/{repo}/{}", entry.path),
                        entry.extension(),
                    ));
                }
                Ok(None) => tracing::debug!("Skipping {} in {}", entry.path, repo),
                Err(_) => {
                    tracing::warn!(
                        "GitHub fetch timed out for {} after {} chunks",
                        repo,
                        chunks.len()
                    );
                    return chunks;
                }
            }
        }

        tracing::info!("Fetched {} chunks from GitHub repo: {}", chunks.len(), repo);
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::ChunkType;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeHost {
        readme: Option<String>,
        tree: Vec<TreeEntry>,
        files: HashMap<String, String>,
        file_delay: Option<Duration>,
        file_calls: AtomicUsize,
    }

    #[async_trait]
    impl RepoHost for FakeHost {
        async fn readme(&self, _repo: &str) -> Option<String> {
            self.readme.clone()
        }

        async fn tree(&self, _repo: &str) -> Vec<TreeEntry> {
            self.tree.clone()
        }

        async fn file(&self, _repo: &str, path: &str) -> Option<String> {
            self.file_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.file_delay {
                tokio::time::sleep(delay).await;
            }
            self.files.get(path).cloned()
        }
    }

    #[test]
    fn test_select_files_filters_and_orders() {
        let entries = vec![
            TreeEntry::blob("src/deep/mod.py", 10),
            TreeEntry::blob("main.py", 10),
            TreeEntry::blob("node_modules/x/index.js", 10),
            TreeEntry::blob("logo.png", 10),
            TreeEntry::blob("big.json", 200_000),
            TreeEntry {
                path: "src".to_string(),
                kind: "tree".to_string(),
                size: None,
            },
            TreeEntry::blob("app.ts", 10),
            TreeEntry::blob("src/a.go", 10),
        ];

        let selected = select_files(entries, &FetchLimits::default());
        let paths: Vec<&str> = selected.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["app.ts", "main.py", "src/a.go", "src/deep/mod.py"]);
    }

    #[test]
    fn test_select_files_caps_count() {
        let entries = (0..40)
            .map(|i| TreeEntry::blob(format!("f{i:02}.py"), 1))
            .collect();
        let selected = select_files(entries, &FetchLimits::default());
        assert_eq!(selected.len(), 25);
        assert_eq!(selected[0].path, "f00.py");
    }

    #[test]
    fn test_extension() {
        assert_eq!(TreeEntry::blob("a/b/c.tsx", 1).extension(), "tsx");
        assert_eq!(TreeEntry::blob("Makefile", 1).extension(), "");
        assert_eq!(TreeEntry::blob(".github/x.yml", 1).extension(), "yml");
    }

    #[test]
    fn test_decode_content_with_line_breaks() {
        // "hello world" wrapped the way the contents API does it
        assert_eq!(decode_content("aGVsbG8g\nd29ybGQ=\n").unwrap(), "hello world");
        assert!(decode_content("***").is_err());
    }

    #[tokio::test]
    async fn test_fetch_chunks_labels_and_skips_markdown() {
        let mut files = HashMap::new();
        files.insert("main.py".to_string(), "def main():\n    pass\n".to_string());
        files.insert("docs/guide.md".to_string(), "# Guide".to_string());

        let host = Arc::new(FakeHost {
            readme: Some("# Demo\n\nA demo repository.".to_string()),
            tree: vec![
                TreeEntry::blob("main.py", 20),
                TreeEntry::blob("docs/guide.md", 7),
                TreeEntry::blob("missing.rs", 5),
            ],
            files,
            ..Default::default()
        });

        let fetcher = RepoFetcher::new(host.clone());
        let chunks = fetcher.fetch_chunks("ava/demo").await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source(), "github/ava/demo/README.md");
        assert_eq!(chunks[0].chunk_type(), ChunkType::Markdown);
        assert_eq!(chunks[1].source(), "github/ava/demo/main.py");
        assert_eq!(chunks[1].lang(), Some("py"));
        // guide.md is never requested, missing.rs fails quietly
        assert_eq!(host.file_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_chunks_empty_repository() {
        let fetcher = RepoFetcher::new(Arc::new(FakeHost::default()));
        assert!(fetcher.fetch_chunks("ava/empty").await.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_keeps_partial_results() {
        let mut files = HashMap::new();
        files.insert("a.py".to_string(), "x = 1".to_string());
        let host = Arc::new(FakeHost {
            readme: Some("readme text".to_string()),
            tree: vec![TreeEntry::blob("a.py", 5)],
            files,
            file_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });

        let fetcher = RepoFetcher::new(host).with_limits(FetchLimits {
            timeout: Duration::from_millis(50),
            ..FetchLimits::default()
        });
        let chunks = fetcher.fetch_chunks("ava/slow").await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source(), "github/ava/slow/README.md");
    }
}
