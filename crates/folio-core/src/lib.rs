//! Folio Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout Folio:
//! - Retrieval units (chunks, embedded chunks, search results)
//! - Chat modes and streaming events
//! - The profile record schema
//! - Common error types
//! - The completion service boundary
//! - Configuration management

pub mod config;
pub mod profile;

pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, GithubConfig, LlmConfig,
    LlmProvider, PathsConfig, RagConfig, RateLimitConfig,
};
pub use profile::{Portfolio, Project};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Folio operations
#[derive(Error, Debug)]
pub enum FolioError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for FolioError {
    fn from(err: ConfigError) -> Self {
        FolioError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FolioError>;

// ============================================================================
// Chunks
// ============================================================================

/// Splitting strategy a chunk was produced with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Markdown,
    Code,
    Prose,
    Portfolio,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Markdown => "markdown",
            ChunkType::Code => "code",
            ChunkType::Prose => "prose",
            ChunkType::Portfolio => "portfolio",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded span of text with provenance metadata
///
/// Text is trimmed on construction and never empty. Fields are read-only;
/// a chunk is never modified after it has been created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    text: String,
    source: String,
    #[serde(rename = "type")]
    chunk_type: ChunkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lang: Option<String>,
}

impl Chunk {
    /// Create a chunk, returning `None` when the text is blank
    pub fn new(
        text: impl AsRef<str>,
        source: impl Into<String>,
        chunk_type: ChunkType,
    ) -> Option<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            source: source.into(),
            chunk_type,
            lang: None,
        })
    }

    /// Attach a language tag
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }
}

/// A chunk together with its unit-norm embedding
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn into_parts(self) -> (Chunk, Vec<f32>) {
        (self.chunk, self.vector)
    }
}

/// Search result from a vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chunk text
    pub text: String,

    /// Provenance label
    pub source: String,

    /// Cosine similarity (inner product of unit vectors)
    pub score: f32,

    /// Strategy the chunk was split with
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<ChunkType>,
}

impl SearchResult {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            text: chunk.text().to_string(),
            source: chunk.source().to_string(),
            score,
            chunk_type: Some(chunk.chunk_type()),
        }
    }
}

// ============================================================================
// Chat
// ============================================================================

/// Answering persona selected by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Hr,
    Technical,
    Summary,
}

impl ChatMode {
    pub const ALL: [ChatMode; 3] = [ChatMode::Hr, ChatMode::Technical, ChatMode::Summary];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Hr => "hr",
            ChatMode::Technical => "technical",
            ChatMode::Summary => "summary",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChatMode {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hr" => Ok(Self::Hr),
            "technical" => Ok(Self::Technical),
            "summary" => Ok(Self::Summary),
            _ => Err(FolioError::InvalidInput(format!("unknown chat mode: {s}"))),
        }
    }
}

/// Kind of a streamed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEventKind {
    Token,
    Done,
    Error,
}

/// One event of a streamed answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
    pub data: String,
}

impl StreamEvent {
    pub fn token(data: impl Into<String>) -> Self {
        Self {
            kind: StreamEventKind::Token,
            data: data.into(),
        }
    }

    pub fn done() -> Self {
        Self {
            kind: StreamEventKind::Done,
            data: String::new(),
        }
    }

    pub fn error(data: impl Into<String>) -> Self {
        Self {
            kind: StreamEventKind::Error,
            data: data.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, StreamEventKind::Token)
    }
}

// ============================================================================
// LLM Client Trait
// ============================================================================

/// Trait for LLM completion clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response for a system prompt and user message
    async fn generate(&self, system: &str, user: &str) -> Result<String>;

    /// Generate a streaming response
    async fn generate_stream(
        &self,
        system: &str,
        user: &str,
    ) -> Result<futures::stream::BoxStream<'static, Result<String>>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_rejects_blank_text() {
        assert!(Chunk::new("", "s", ChunkType::Prose).is_none());
        assert!(Chunk::new("  \n\t ", "s", ChunkType::Prose).is_none());
    }

    #[test]
    fn test_chunk_trims_text() {
        let chunk = Chunk::new("  hello \n", "portfolio/identity", ChunkType::Prose).unwrap();
        assert_eq!(chunk.text(), "hello");
        assert_eq!(chunk.source(), "portfolio/identity");
        assert_eq!(chunk.lang(), None);
    }

    #[test]
    fn test_chunk_serde_shape() {
        let chunk = Chunk::new("fn main() {}", "github/a/b/main.rs", ChunkType::Code)
            .unwrap()
            .with_lang("rs");
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "code");
        assert_eq!(json["lang"], "rs");

        let plain = Chunk::new("x", "s", ChunkType::Prose).unwrap();
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("lang").is_none());
    }

    #[test]
    fn test_chat_mode_parse() {
        assert_eq!("HR".parse::<ChatMode>().unwrap(), ChatMode::Hr);
        assert_eq!(
            "technical".parse::<ChatMode>().unwrap(),
            ChatMode::Technical
        );
        assert!("poetry".parse::<ChatMode>().is_err());
        assert_eq!(ChatMode::default(), ChatMode::Hr);
    }

    #[test]
    fn test_stream_event_wire_format() {
        let json = serde_json::to_string(&StreamEvent::token("Hi")).unwrap();
        assert_eq!(json, r#"{"type":"token","data":"Hi"}"#);
        assert!(StreamEvent::done().is_terminal());
        assert!(StreamEvent::error("x").is_terminal());
        assert!(!StreamEvent::token("x").is_terminal());
    }

    struct EchoLlm;

    #[async_trait::async_trait]
    impl LlmClient for EchoLlm {
        async fn generate(&self, system: &str, user: &str) -> Result<String> {
            Ok(format!("{system}|{user}"))
        }

        async fn generate_stream(
            &self,
            _system: &str,
            user: &str,
        ) -> Result<futures::stream::BoxStream<'static, Result<String>>> {
            let words: Vec<Result<String>> =
                user.split(' ').map(|w| Ok(w.to_string())).collect();
            Ok(Box::pin(futures::stream::iter(words)))
        }
    }

    #[test]
    fn test_llm_client_object_safety() {
        let client: Box<dyn LlmClient> = Box::new(EchoLlm);
        let out = tokio_test::block_on(client.generate("sys", "hi")).unwrap();
        assert_eq!(out, "sys|hi");
    }
}
