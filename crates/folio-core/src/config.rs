//! Folio Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults suitable for local development.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "folio.toml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Repository hosting API configuration
    pub github: GithubConfig,

    /// Retrieval configuration
    pub rag: RagConfig,

    /// Input and storage locations
    pub paths: PathsConfig,

    /// Public profile links
    pub profile: ProfileConfig,

    /// Per-client limits on the chat endpoints
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        })
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            config.server.port = parse_env("API_PORT", port)?;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.openai_base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }

        // Embedding
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIMENSION") {
            config.embedding.dimension = parse_env("EMBEDDING_DIMENSION", dim)?;
        }
        if let Ok(repo) = std::env::var("EMBEDDING_LOCAL_MODEL") {
            config.embedding.local_model = repo;
        }
        if let Ok(dir) = std::env::var("EMBEDDING_MODEL_DIR") {
            config.embedding.model_dir = Some(PathBuf::from(dir)).filter(|d| !d.as_os_str().is_empty());
        }
        if let Ok(dir) = std::env::var("EMBEDDING_CACHE_DIR") {
            config.embedding.model_cache_dir = dir.into();
        }

        // GitHub
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.trim().is_empty() {
                config.github.token = Some(token);
            }
        }

        // Retrieval
        if let Ok(k) = std::env::var("TOP_K_RETRIEVAL") {
            config.rag.top_k = parse_env("TOP_K_RETRIEVAL", k)?;
        }
        if let Ok(t) = std::env::var("SIMILARITY_THRESHOLD") {
            config.rag.similarity_threshold = parse_env("SIMILARITY_THRESHOLD", t)?;
        }
        if let Ok(t) = std::env::var("MAX_CONTEXT_TOKENS") {
            config.rag.max_context_tokens = parse_env("MAX_CONTEXT_TOKENS", t)?;
        }

        // Paths
        if let Ok(p) = std::env::var("PORTFOLIO_JSON_PATH") {
            config.paths.portfolio_json = p.into();
        }
        if let Ok(p) = std::env::var("RESUME_PATH") {
            config.paths.resume = p.into();
        }
        if let Ok(p) = std::env::var("INDEXES_DIR") {
            config.paths.indexes_dir = p.into();
        }
        if let Ok(p) = std::env::var("PROMPTS_DIR") {
            config.paths.prompts_dir = p.into();
        }

        // Profile links
        if let Ok(url) = std::env::var("RESUME_DOWNLOAD_URL") {
            config.profile.resume_download_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Ok(url) = std::env::var("RESUME_VIEW_URL") {
            config.profile.resume_view_url = Some(url).filter(|u| !u.is_empty());
        }

        // Rate limiting
        if let Ok(enabled) = std::env::var("RATE_LIMIT_ENABLED") {
            config.rate_limit.enabled = parse_env("RATE_LIMIT_ENABLED", enabled)?;
        }
        if let Ok(n) = std::env::var("RATE_LIMIT_REQUESTS") {
            config.rate_limit.requests = parse_env("RATE_LIMIT_REQUESTS", n)?;
        }
        if let Ok(secs) = std::env::var("RATE_LIMIT_WINDOW") {
            config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW", secs)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Explicit file, else `folio.toml` in the working directory, else environment only.
    /// Environment values override whatever a file sets.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_file = Path::new(DEFAULT_CONFIG_FILE);
        match path {
            Some(path) => Self::from_file(path)?.with_env_override(),
            None if default_file.exists() => Self::from_file(default_file)?.with_env_override(),
            None => Self::from_env(),
        }
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;
        let defaults = Self::default();

        // Only override if env values differ from defaults
        if env_config.server.host != defaults.server.host {
            self.server.host = env_config.server.host;
        }
        if env_config.server.port != defaults.server.port {
            self.server.port = env_config.server.port;
        }
        if !env_config.server.cors_origins.is_empty() {
            self.server.cors_origins = env_config.server.cors_origins;
        }
        if env_config.llm.provider != defaults.llm.provider {
            self.llm.provider = env_config.llm.provider;
        }
        if env_config.llm.model != defaults.llm.model {
            self.llm.model = env_config.llm.model;
        }
        if env_config.embedding.provider != defaults.embedding.provider {
            self.embedding.provider = env_config.embedding.provider;
        }
        if env_config.embedding.dimension != defaults.embedding.dimension {
            self.embedding.dimension = env_config.embedding.dimension;
        }
        if env_config.embedding.model_dir.is_some() {
            self.embedding.model_dir = env_config.embedding.model_dir;
        }
        if env_config.rate_limit != defaults.rate_limit {
            self.rate_limit = env_config.rate_limit;
        }
        if env_config.paths.indexes_dir != defaults.paths.indexes_dir {
            self.paths.indexes_dir = env_config.paths.indexes_dir;
        }
        if env_config.logging.level != defaults.logging.level {
            self.logging.level = env_config.logging.level;
        }

        // Always use env for sensitive values
        if env_config.llm.openai_api_key.is_some() {
            self.llm.openai_api_key = env_config.llm.openai_api_key;
        }
        if env_config.github.token.is_some() {
            self.github.token = env_config.github.token;
        }

        Ok(self)
    }

    /// Copy with secrets replaced, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.llm.openai_api_key.is_some() {
            copy.llm.openai_api_key = Some("***".to_string());
        }
        if copy.github.token.is_some() {
            copy.github.token = Some("***".to_string());
        }
        copy
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Allowed origins for CORS (empty allows any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 120,
            cors_origins: vec![],
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding backend
    pub provider: EmbeddingProvider,

    /// Model name for remote backends
    pub model: String,

    /// Hugging Face repository of the local sentence model
    pub local_model: String,

    /// Directory already holding the local model files; skips the download
    pub model_dir: Option<PathBuf>,

    /// Download cache for the local model
    pub model_cache_dir: PathBuf,

    /// Tokens kept per text by the local model
    pub max_sequence_length: usize,

    /// Vector dimension (must match the model)
    pub dimension: usize,

    /// Texts per remote request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: "all-minilm".to_string(),
            local_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            model_cache_dir: PathBuf::from("models"),
            max_sequence_length: 256,
            dimension: 384,
            batch_size: 64,
        }
    }
}

/// Supported embedding backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// In-process sentence model (all-MiniLM-L6-v2 by default)
    Local,
    /// Lexical feature hashing, no model files
    Hashing,
    OpenAI,
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "minilm" => Ok(Self::Local),
            "hash" | "hashing" => Ok(Self::Hashing),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Repository hosting API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Personal access token (optional, raises rate limits)
    pub token: Option<String>,

    /// API base URL
    pub api_base: String,

    /// Overall fetch deadline in seconds
    pub timeout_secs: u64,

    /// Maximum source files fetched per repository
    pub max_files: usize,

    /// Largest file fetched, in bytes
    pub max_file_bytes: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://api.github.com".to_string(),
            timeout_secs: 20,
            max_files: 25,
            max_file_bytes: 80 * 1024,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Results taken from the portfolio index
    pub top_k: usize,

    /// Results taken from the resume index
    pub resume_top_k: usize,

    /// Results taken from a repository index
    pub repo_top_k: usize,

    /// Minimum score for a search hit
    pub similarity_threshold: f32,

    /// Context budget in tokens
    pub max_context_tokens: usize,

    /// Characters assumed per token
    pub chars_per_token: usize,

    /// Case-insensitive phrases that mark a query as off-topic
    pub off_topic_patterns: Vec<String>,
}

impl RagConfig {
    /// Context budget in characters
    pub fn context_char_budget(&self) -> usize {
        self.max_context_tokens.saturating_mul(self.chars_per_token)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            resume_top_k: 3,
            repo_top_k: 6,
            similarity_threshold: 0.1,
            max_context_tokens: 3000,
            chars_per_token: 4,
            off_topic_patterns: [
                "recipe",
                "cooking",
                "restaurant",
                "cricket score",
                "match result",
                "movie review",
                "song lyrics",
                "stock price",
                "crypto price",
                "weather forecast",
                "horoscope",
                "joke",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Input and storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Structured profile record
    pub portfolio_json: PathBuf,

    /// Resume document (pdf, txt or md)
    pub resume: PathBuf,

    /// Root directory for persisted indexes
    pub indexes_dir: PathBuf,

    /// Directory holding prompt overlays
    pub prompts_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            portfolio_json: PathBuf::from("data/portfolio.json"),
            resume: PathBuf::from("data/resume.pdf"),
            indexes_dir: PathBuf::from("indexes"),
            prompts_dir: PathBuf::from("prompts"),
        }
    }
}

/// Public profile links
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProfileConfig {
    pub resume_download_url: Option<String>,
    pub resume_view_url: Option<String>,
}

/// Per-client request limits on the chat endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Requests allowed per client within one window
    pub requests: u32,

    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 20,
            window_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.rag.top_k, 8);
        assert_eq!(config.rag.context_char_budget(), 12_000);
        assert_eq!(config.github.max_files, 25);
        assert_eq!(config.github.max_file_bytes, 81_920);
        assert_eq!(config.rate_limit, RateLimitConfig { enabled: true, requests: 20, window_secs: 60 });
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!(
            "ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
        assert!("azure".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_embedding_provider_parse() {
        assert_eq!(
            "minilm".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Local
        );
        assert_eq!(
            "hash".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Hashing
        );
        assert!("word2vec".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [rag]
            top_k = 4

            [paths]
            indexes_dir = "/var/lib/folio"
            "#,
        )
        .unwrap();
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.rag.resume_top_k, 3);
        assert_eq!(config.paths.indexes_dir, PathBuf::from("/var/lib/folio"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/folio.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_invalid_env_number() {
        let err = parse_env::<u16>("API_PORT", "eighty".to_string()).unwrap_err();
        assert!(err.to_string().contains("API_PORT"));
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = AppConfig::default();
        config.llm.openai_api_key = Some("sk-live".to_string());
        config.github.token = Some("ghp_x".to_string());
        let shown = config.redacted();
        assert_eq!(shown.llm.openai_api_key.as_deref(), Some("***"));
        assert_eq!(shown.github.token.as_deref(), Some("***"));
    }
}
