//! Ollama Provider Implementation
//!
//! Runs extraction against a local Ollama instance, which is useful for
//! development without an API key.
//!
//! # Examples
//!
//! ```no_run
//! use hcp_llm::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3").unwrap();
//! ```

use crate::LlmError;
use async_trait::async_trait;
use hcp_domain::{LlmProvider, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for LLM requests (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of attempts per completion
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Ollama API provider for local LLM inference
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    json_mode: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with a custom request timeout
    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
            retry: RetryPolicy::new(DEFAULT_MAX_RETRIES),
            json_mode: true,
        })
    }

    /// Create a provider against `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ask Ollama to constrain output to JSON (on by default)
    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: self.json_mode.then_some("json"),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::from_status(status, text, &self.model));
        }

        let parsed: GenerateResponse = response.json().await.map_err(LlmError::from_reqwest)?;
        debug!(model = %self.model, chars = parsed.response.len(), "Ollama completion received");
        Ok(parsed.response)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    type Error = LlmError;

    async fn complete(&self, prompt: &str) -> Result<String, Self::Error> {
        self.retry
            .retry("ollama.generate", || self.generate_once(prompt))
            .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new("http://localhost:11434/", "llama3").unwrap();
        assert_eq!(provider.endpoint, "http://localhost:11434");
        assert_eq!(provider.model_name(), "llama3");
        assert_eq!(provider.retry.max_attempts, DEFAULT_MAX_RETRIES);
        assert!(provider.json_mode);
    }

    #[test]
    fn test_ollama_provider_default_endpoint() {
        let provider = OllamaProvider::default_endpoint("mistral").unwrap();
        assert_eq!(provider.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_request_omits_format_without_json_mode() {
        let body = GenerateRequest {
            model: "m",
            prompt: "p",
            stream: false,
            format: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("format").is_none());
        assert_eq!(json["stream"], false);
    }

    #[tokio::test]
    async fn test_ollama_unreachable_is_communication_error() {
        let provider = OllamaProvider::new("http://127.0.0.1:9", "llama3")
            .unwrap()
            .with_retry(RetryPolicy::immediate(1));

        let result = provider.complete("test").await;
        assert!(matches!(
            result,
            Err(LlmError::Communication(_)) | Err(LlmError::Timeout)
        ));
    }

    #[tokio::test]
    #[ignore] // Only run when Ollama is available
    async fn test_ollama_generate_integration() {
        let provider = OllamaProvider::default_endpoint("llama3").unwrap();
        let response = provider
            .complete("Reply with the JSON object {\"ok\": true}")
            .await
            .unwrap();
        assert!(!response.is_empty());
    }
}
