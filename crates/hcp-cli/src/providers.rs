//! Collaborator construction from configuration and credentials.

use crate::cli::KeyArgs;
use crate::config::{Config, LlmBackendKind};
use crate::error::{CliError, Result};
use async_trait::async_trait;
use hcp_domain::{LlmProvider, RetryPolicy};
use hcp_llm::{LlmError, OllamaProvider, OpenAiProvider};
use hcp_sources::{HttpScraper, SerperSearch};
use std::time::Duration;
use tracing::debug;

/// LLM backend picked at runtime from `[llm].provider`
pub enum LlmBackend {
    /// OpenAI-compatible chat completions
    OpenAi(OpenAiProvider),
    /// Local Ollama server
    Ollama(OllamaProvider),
}

#[async_trait]
impl LlmProvider for LlmBackend {
    type Error = LlmError;

    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        match self {
            LlmBackend::OpenAi(provider) => provider.complete(prompt).await,
            LlmBackend::Ollama(provider) => provider.complete(prompt).await,
        }
    }

    fn model_name(&self) -> &str {
        match self {
            LlmBackend::OpenAi(provider) => provider.model_name(),
            LlmBackend::Ollama(provider) => provider.model_name(),
        }
    }
}

/// Build the Serper search client. The key is required.
pub fn search_provider(config: &Config, keys: &KeyArgs) -> Result<SerperSearch> {
    let key = keys.serper_key().ok_or(CliError::MissingKey(
        "set SERPER_API_KEY or pass --serper-key",
    ))?;

    let settings = &config.search;
    let search = SerperSearch::with_timeout(key, Duration::from_secs(settings.timeout_secs))?
        .with_endpoint(settings.endpoint.clone())
        .with_region(settings.region())
        .with_retry(RetryPolicy::new(settings.max_retries));
    debug!(endpoint = %settings.endpoint, "Search provider ready");
    Ok(search)
}

/// Build the page scraper.
pub fn scrape_provider(config: &Config) -> Result<HttpScraper> {
    let scraper = HttpScraper::with_timeout(Duration::from_secs(config.scrape.timeout_secs))?
        .with_max_bytes(config.scrape.max_bytes);
    Ok(scraper)
}

/// Build the configured LLM backend. An OpenAI key is required unless the
/// provider is ollama.
pub fn llm_provider(config: &Config, keys: &KeyArgs) -> Result<LlmBackend> {
    let settings = &config.llm;
    let timeout = Duration::from_secs(settings.timeout_secs);
    let retry = RetryPolicy::new(settings.max_retries);

    let backend = match settings.provider {
        LlmBackendKind::OpenAi => {
            let key = keys.openai_key().ok_or(CliError::MissingKey(
                "set OPENAI_API_KEY or pass --openai-key",
            ))?;
            let mut provider = OpenAiProvider::with_timeout(key, settings.model.clone(), timeout)?
                .with_retry(retry);
            if let Some(endpoint) = &settings.endpoint {
                provider = provider.with_base_url(endpoint.clone());
            }
            LlmBackend::OpenAi(provider)
        }
        LlmBackendKind::Ollama => {
            let endpoint = settings
                .endpoint
                .clone()
                .unwrap_or_else(|| hcp_llm::ollama::DEFAULT_ENDPOINT.to_string());
            let provider = OllamaProvider::with_timeout(endpoint, settings.model.clone(), timeout)?
                .with_retry(retry);
            LlmBackend::Ollama(provider)
        }
    };
    debug!(model = %backend.model_name(), "LLM provider ready");
    Ok(backend)
}
