//! Embedding clients
//!
//! Every client returns L2-normalized vectors so that inner product equals
//! cosine similarity. Supports OpenAI and Ollama embedding APIs, the
//! in-process sentence model in [`crate::local_model`], and a lexical
//! hashing embedder for offline tests.

use async_trait::async_trait;
use folio_core::config::{AppConfig, EmbeddingConfig, LlmConfig};
use folio_core::{EmbeddingProvider, FolioError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Scale a vector to unit length in place; zero vectors are left untouched
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

fn normalized(mut vector: Vec<f32>) -> Vec<f32> {
    l2_normalize(&mut vector);
    vector
}

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, one per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model,
            dimension,
            batch_size: 64,
        }
    }

    /// Create from config
    pub fn from_config(llm: &LlmConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let api_key = llm
            .openai_api_key
            .as_ref()
            .ok_or_else(|| FolioError::Config("OpenAI API key required".to_string()))?;

        let mut client = Self::new(api_key.clone(), embedding.model.clone());
        client.dimension = embedding.dimension;
        client.batch_size = embedding.batch_size.max(1);
        if let Some(url) = &llm.openai_base_url {
            client.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(client)
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = OpenAiEmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| FolioError::Embedding(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FolioError::Embedding(format!(
                "OpenAI embedding error: {error_text}"
            )));
        }

        let result: OpenAiEmbeddingResponse = response.json().await.map_err(|e| {
            FolioError::Embedding(format!("Failed to parse embedding response: {e}"))
        })?;

        if result.data.len() != texts.len() {
            return Err(FolioError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        // Sort by index and extract embeddings
        let mut embeddings = result.data;
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings
            .into_iter()
            .map(|e| normalized(e.embedding))
            .collect())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768,
        };

        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(llm: &LlmConfig, embedding: &EmbeddingConfig) -> Self {
        let mut client = Self::new(llm.ollama_url.clone(), embedding.model.clone());
        client.dimension = embedding.dimension;
        client
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| FolioError::Embedding(format!("Ollama embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FolioError::Embedding(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            FolioError::Embedding(format!("Failed to parse embedding response: {e}"))
        })?;

        Ok(normalized(result.embedding))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama doesn't have native batch embedding, so we process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Hashing Embedding
// ============================================================================

/// Deterministic feature-hashing embedder
///
/// Lowercased alphanumeric tokens are hashed into signed buckets, so
/// similarity only reflects shared words. Needs no network or model files;
/// used by tests and by the explicit `hashing` provider.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed without going through the async trait
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        normalized(vector)
    }
}

#[async_trait]
impl EmbeddingClient for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Lazy single-instance wrapper
// ============================================================================

type EmbedderFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn EmbeddingClient>>> + Send>>;
type EmbedderFactory = Box<dyn Fn() -> EmbedderFuture + Send + Sync>;

/// Builds the wrapped client on first use and reuses it afterwards
///
/// One `LazyEmbedder` is created per process and handed to every component
/// that embeds, so the underlying model is loaded at most once. A failed
/// build is retried on the next call.
pub struct LazyEmbedder {
    dimension: usize,
    factory: EmbedderFactory,
    inner: OnceCell<Arc<dyn EmbeddingClient>>,
}

impl LazyEmbedder {
    pub fn new<F, Fut>(dimension: usize, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn EmbeddingClient>>> + Send + 'static,
    {
        Self {
            dimension,
            factory: Box::new(move || Box::pin(factory())),
            inner: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized()
    }

    async fn client(&self) -> Result<&Arc<dyn EmbeddingClient>> {
        self.inner
            .get_or_try_init(|| async {
                let client = (self.factory)().await?;
                if client.dimension() != self.dimension {
                    return Err(FolioError::Config(format!(
                        "Embedder produces {} dimensions, configured {}",
                        client.dimension(),
                        self.dimension
                    )));
                }
                tracing::info!("Embedding model initialized ({} dims)", self.dimension);
                Ok(client)
            })
            .await
    }
}

#[async_trait]
impl EmbeddingClient for LazyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client().await?.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.client().await?.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Factory function
// ============================================================================

#[cfg(feature = "local-model")]
async fn local_client(embedding: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    use crate::local_model::{MiniLmEmbedding, ModelFiles};

    let files = ModelFiles::resolve(embedding).await?;
    Ok(Arc::new(MiniLmEmbedding::load(
        &files,
        embedding.max_sequence_length,
    )?))
}

#[cfg(not(feature = "local-model"))]
async fn local_client(_embedding: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    Err(FolioError::Config(
        "local embedding provider needs the `local-model` feature".to_string(),
    ))
}

/// Client for the configured provider, built on the spot
pub async fn build_embedding_client(
    llm: &LlmConfig,
    embedding: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingClient>> {
    let client: Arc<dyn EmbeddingClient> = match embedding.provider {
        EmbeddingProvider::Local => local_client(embedding).await?,
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedding::new(embedding.dimension)),
        EmbeddingProvider::OpenAI => Arc::new(OpenAiEmbedding::from_config(llm, embedding)?),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedding::from_config(llm, embedding)),
    };
    Ok(client)
}

/// Create the process-wide embedding client from config
///
/// Nothing is loaded or downloaded until the first embedding call.
pub fn create_embedding_client(config: &AppConfig) -> Arc<dyn EmbeddingClient> {
    let llm = Arc::new(config.llm.clone());
    let embedding = Arc::new(config.embedding.clone());

    Arc::new(LazyEmbedder::new(config.embedding.dimension, move || {
        let llm = llm.clone();
        let embedding = embedding.clone();
        async move { build_embedding_client(&llm, &embedding).await }
    }))
}

// ============================================================================
// Tests
// ============================================================================
