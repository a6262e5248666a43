//! Completion clients and the degrading responder
//!
//! Clients speak the OpenAI chat-completions and Ollama generate APIs, each
//! with a blocking and a streaming form. [`Responder`] wraps a client and
//! turns every failure into a user-visible apology or a terminal error event.

use async_trait::async_trait;
use folio_core::{FolioError, LlmClient, LlmConfig, LlmProvider, Result, StreamEvent};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| FolioError::Llm(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// Line framing
// ============================================================================

/// Complete lines of a chunked byte stream
///
/// Bytes are buffered across frames, so a line or a multi-byte character
/// split between two frames is decoded whole. An unterminated last line is
/// emitted when the stream ends. The stream ends after the first read error.
fn stream_lines<S, B, E>(frames: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    stream::unfold(
        (Box::pin(frames), Vec::<u8>::new(), false),
        |(mut frames, mut buffer, mut ended)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let rest = buffer.split_off(pos + 1);
                    let line = String::from_utf8_lossy(&buffer).into_owned();
                    buffer = rest;
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some((Ok(line), (frames, buffer, ended)));
                }
                if ended {
                    if buffer.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    let line = String::from_utf8_lossy(&std::mem::take(&mut buffer)).into_owned();
                    return Some((Ok(line), (frames, buffer, ended)));
                }
                match frames.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                    Some(Err(e)) => {
                        buffer.clear();
                        let err = FolioError::Llm(format!("Stream error: {e}"));
                        return Some((Err(err), (frames, buffer, true)));
                    }
                    None => ended = true,
                }
            }
        },
    )
}

/// Text fragments extracted from each complete line by `parse`
fn line_deltas<S, B, E>(
    frames: S,
    parse: fn(&str) -> Option<String>,
) -> BoxStream<'static, Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    stream_lines(frames)
        .filter_map(move |line| async move {
            match line {
                Ok(line) => parse(&line).map(Ok),
                Err(e) => Some(Err(e)),
            }
        })
        .boxed()
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// OpenAI-compatible chat completions client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Delta content of one SSE line, if it carries any
fn openai_delta(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return None;
    }
    let parsed: StreamResponse = serde_json::from_str(data).ok()?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty())
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| FolioError::Config("OpenAI API key required".to_string()))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url: config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Set custom base URL (for OpenAI-compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn send(&self, system: &str, user: &str, stream: bool) -> Result<reqwest::Response> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: stream.then_some(true),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FolioError::Llm(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(FolioError::Llm(format!("OpenAI error {status}: {error_text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let result: OpenAiResponse = self
            .send(system, user, false)
            .await?
            .json()
            .await
            .map_err(|e| FolioError::Llm(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| FolioError::Llm("No response generated".to_string()))
    }

    async fn generate_stream(
        &self,
        system: &str,
        user: &str,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.send(system, user, true).await?;

        Ok(line_deltas(response.bytes_stream(), openai_delta))
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama generate API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

/// `response` field of one NDJSON line, if non-empty
fn ollama_delta(line: &str) -> Option<String> {
    serde_json::from_str::<OllamaResponse>(line.trim())
        .ok()
        .map(|r| r.response)
        .filter(|r| !r.is_empty())
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn send(&self, system: &str, user: &str, stream: bool) -> Result<reqwest::Response> {
        let request = OllamaRequest {
            model: &self.model,
            system,
            prompt: user,
            stream,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| FolioError::Llm(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FolioError::Llm(format!("Ollama error: {error_text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let result: OllamaResponse = self
            .send(system, user, false)
            .await?
            .json()
            .await
            .map_err(|e| FolioError::Llm(format!("Failed to parse Ollama response: {e}")))?;

        Ok(result.response)
    }

    async fn generate_stream(
        &self,
        system: &str,
        user: &str,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.send(system, user, true).await?;

        Ok(line_deltas(response.bytes_stream(), ollama_delta))
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAI => Ok(Arc::new(OpenAiClient::from_config(config)?)),
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Responder
// ============================================================================

pub const APOLOGY: &str = "I'm having trouble generating a response right now. \
Please try again in a moment.";

pub const STREAM_INTERRUPTED: &str = "Stream interrupted. Please retry.";

/// Completion front that never surfaces an error to the caller
#[derive(Clone, Default)]
pub struct Responder {
    client: Option<Arc<dyn LlmClient>>,
}

impl Responder {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Responder with no backing client; every call degrades
    pub fn unconfigured() -> Self {
        Self { client: None }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        match create_llm_client(config) {
            Ok(client) => Self::new(client),
            Err(e) => {
                tracing::warn!("LLM client not configured: {}", e);
                Self::unconfigured()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Full answer, or [`APOLOGY`] on any failure
    pub async fn complete(&self, system: &str, user: &str) -> String {
        let Some(client) = &self.client else {
            return APOLOGY.to_string();
        };
        match client.generate(system, user).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Completion failed: {}", e);
                APOLOGY.to_string()
            }
        }
    }

    /// Token events ending in exactly one `done` or `error` event
    pub fn stream(&self, system: String, user: String) -> BoxStream<'static, StreamEvent> {
        let client = self.client.clone();
        stream::once(async move {
            let Some(client) = client else {
                tracing::warn!("Streaming requested without a configured LLM client");
                return stream::iter([StreamEvent::error(STREAM_INTERRUPTED)]).boxed();
            };
            match client.generate_stream(&system, &user).await {
                Ok(tokens) => token_events(tokens),
                Err(e) => {
                    tracing::error!("Stream request failed: {}", e);
                    stream::iter([StreamEvent::error(STREAM_INTERRUPTED)]).boxed()
                }
            }
        })
        .flatten()
        .boxed()
    }
}

/// A fixed message delivered as one token plus `done`
pub fn canned_stream(message: impl Into<String>) -> BoxStream<'static, StreamEvent> {
    stream::iter([StreamEvent::token(message), StreamEvent::done()]).boxed()
}

fn token_events(tokens: BoxStream<'static, Result<String>>) -> BoxStream<'static, StreamEvent> {
    stream::unfold(Some(tokens), |state| async move {
        let mut tokens = state?;
        match tokens.next().await {
            Some(Ok(token)) => Some((StreamEvent::token(token), Some(tokens))),
            Some(Err(e)) => {
                tracing::error!("Streaming error: {}", e);
                Some((StreamEvent::error(STREAM_INTERRUPTED), None))
            }
            None => Some((StreamEvent::done(), None)),
        }
    })
    .boxed()
}
