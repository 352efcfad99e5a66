use anyhow::{Context, Result};
use extract::{AnthropicClient, OllamaClient, TextGenerator};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;

/// Environment variable naming a TOML config file
pub const CONFIG_ENV: &str = "KG_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub concurrency: ConcurrencyConfig,
    pub jobs: JobsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    /// Provider default when unset
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub extraction_max_tokens: u32,
    pub linking_max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrent_llm_calls: usize,
    pub request_timeout_secs: u64,
    /// Model calls still pending at the deadline fall back per document
    pub run_deadline_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            base_url: None,
            model: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            extraction_max_tokens: extract::EXTRACTION_MAX_TOKENS,
            linking_max_tokens: link::LINKING_MAX_TOKENS,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_llm_calls: 3,
            request_timeout_secs: 120,
            run_deadline_secs: None,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, else from the file named by `KG_CONFIG`, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV).ok();
        let path = path.or(from_env.as_deref().map(Path::new));

        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .context(format!("Failed to read config file: {:?}", path))?;
                Self::from_toml_str(&raw).context(format!("Invalid config file: {:?}", path))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML config")
    }

    /// Build the configured model client, reading the API key from the environment
    pub fn build_generator(&self) -> Result<Arc<dyn TextGenerator>, PipelineError> {
        self.build_generator_with(|name| std::env::var(name).ok())
    }

    pub fn build_generator_with(
        &self,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> Result<Arc<dyn TextGenerator>, PipelineError> {
        let timeout = Duration::from_secs(self.concurrency.request_timeout_secs);
        let llm = &self.llm;

        match llm.provider {
            LlmProvider::Anthropic => {
                let api_key = lookup_env(&llm.api_key_env)
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| PipelineError::config(format!("{} not configured", llm.api_key_env)))?;

                let client = AnthropicClient::new(
                    llm.base_url.clone().unwrap_or_else(|| AnthropicClient::DEFAULT_BASE_URL.to_string()),
                    api_key,
                    llm.model.clone().unwrap_or_else(|| AnthropicClient::DEFAULT_MODEL.to_string()),
                )
                .with_timeout(timeout)
                .map_err(|e| PipelineError::config(format!("{:#}", e)))?;

                Ok(Arc::new(client))
            }
            LlmProvider::Ollama => {
                let client = OllamaClient::new(
                    llm.base_url.clone().unwrap_or_else(|| OllamaClient::DEFAULT_BASE_URL.to_string()),
                    llm.model.clone().unwrap_or_else(|| OllamaClient::DEFAULT_MODEL.to_string()),
                )
                .with_timeout(timeout)
                .map_err(|e| PipelineError::config(format!("{:#}", e)))?;

                Ok(Arc::new(client))
            }
        }
    }
}
