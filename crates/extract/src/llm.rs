use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Result of one text-generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Text(String),
    /// The model answered with something other than text (tool call, empty content, ...)
    NonText,
}

impl Generation {
    pub fn text(&self) -> Option<&str> {
        match self {
            Generation::Text(text) => Some(text),
            Generation::NonText => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Generation::Text(text) => Some(text),
            Generation::NonText => None,
        }
    }
}

/// The only capability the pipeline needs from a language model.
///
/// An `Err` is a transport failure (network, status, timeout); a response the
/// model produced but that is not text is `Ok(Generation::NonText)`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<Generation>;
}

/// A model call for one document failed at the transport level.
#[derive(Debug, thiserror::Error)]
#[error("model call failed for document '{document}'")]
pub struct DocumentCallError {
    pub document: String,
    #[source]
    pub source: anyhow::Error,
}

/// Await `call` unless `deadline` passes first. `None` means the deadline won.
pub async fn within_deadline<F: Future>(deadline: Option<Instant>, call: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, call).await.ok(),
        None => Some(call.await),
    }
}

/// Shorten a model response for log output
pub fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 200;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{}...", head)
    }
}

fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("Failed to build HTTP client")
}

// ---------------------------------------------------------------------------
// Anthropic Messages API
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl AnthropicClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-20250514";
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url,
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    /// Bound every request by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_http_client(Some(timeout))?;
        Ok(self)
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<Generation> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self.client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic request failed: {} {}", status, preview(&body));
        }

        let messages_response: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        Ok(match messages_response.content.into_iter().next() {
            Some(ContentBlock::Text { text }) => Generation::Text(text),
            _ => Generation::NonText,
        })
    }
}

// ---------------------------------------------------------------------------
// Ollama generate API
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &'static str = "llama3";

    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_http_client(Some(timeout))?;
        Ok(self)
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<Generation> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));

        let request = OllamaRequest {
            model: &self.model,
            system,
            prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: max_tokens,
            },
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(Generation::Text(ollama_response.response))
    }
}
