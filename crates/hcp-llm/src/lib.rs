//! HCP Research LLM Provider Layer
//!
//! Pluggable completion providers behind the `LlmProvider` trait from
//! `hcp-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic scripted responses for testing
//! - `OpenAiProvider`: OpenAI-compatible chat completions API
//! - `OllamaProvider`: Local Ollama API integration
//!
//! Every provider receives its credentials and endpoint at construction
//! time; nothing is read from process-wide state.
//!
//! # Examples
//!
//! ```
//! use hcp_llm::MockProvider;
//! use hcp_domain::LlmProvider;
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let provider = MockProvider::new("Hello from LLM!");
//! let result = provider.complete("test prompt").await.unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! # });
//! ```

#![warn(missing_docs)]

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use hcp_domain::{LlmProvider, ProviderFailure};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Server-side failure (HTTP 5xx)
    #[error("Server error: HTTP {0}")]
    Server(u16),

    /// Request exceeded its deadline
    #[error("Request timed out")]
    Timeout,

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Credentials missing or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl ProviderFailure for LlmError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Communication(_)
                | LlmError::Server(_)
                | LlmError::Timeout
                | LlmError::RateLimitExceeded
        )
    }

    fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimitExceeded)
    }

    fn is_fatal(&self) -> bool {
        matches!(self, LlmError::Unauthorized(_))
    }
}

impl LlmError {
    /// Map a failed HTTP status to an error
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String, model: &str) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::Unauthorized(format!("HTTP {}: {}", status, body)),
            404 => LlmError::ModelNotAvailable(model.to_string()),
            429 => LlmError::RateLimitExceeded,
            code if status.is_server_error() => LlmError::Server(code),
            _ => LlmError::InvalidResponse(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Map a transport error to an error
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
        } else {
            LlmError::Communication(format!("Request failed: {}", e))
        }
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail,
    Error(LlmError),
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<(String, Scripted)>,
    prompts: Vec<String>,
}

/// Mock LLM provider for deterministic testing
///
/// Responses are chosen by prompt fragment: the first rule whose fragment
/// appears in the prompt wins, otherwise the default response is returned.
/// Matching on fragments rather than whole prompts keeps tests readable,
/// since pipeline prompts embed whole scraped pages.
///
/// # Examples
///
/// ```
/// use hcp_llm::MockProvider;
/// use hcp_domain::LlmProvider;
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let provider = MockProvider::default();
/// provider.respond_when("phone numbers", r#"{"chunk_results": []}"#);
/// provider.fail_when("Aggregate");
///
/// let reply = provider.complete("Extract ALL phone numbers").await.unwrap();
/// assert_eq!(reply, r#"{"chunk_results": []}"#);
/// assert!(provider.complete("Aggregate these").await.is_err());
/// assert_eq!(provider.call_count(), 2);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            delay: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Sleep before answering (for timeout and cancellation tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reply with `response` when the prompt contains `fragment`
    pub fn respond_when(&self, fragment: impl Into<String>, response: impl Into<String>) {
        self.lock()
            .rules
            .push((fragment.into(), Scripted::Reply(response.into())));
    }

    /// Fail when the prompt contains `fragment`
    pub fn fail_when(&self, fragment: impl Into<String>) {
        self.lock().rules.push((fragment.into(), Scripted::Fail));
    }

    /// Fail with `error` when the prompt contains `fragment`
    pub fn error_when(&self, fragment: impl Into<String>, error: LlmError) {
        self.lock().rules.push((fragment.into(), Scripted::Error(error)));
    }

    /// Number of completions requested so far
    pub fn call_count(&self) -> usize {
        self.lock().prompts.len()
    }

    /// Every prompt received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    /// Number of received prompts containing `fragment`
    pub fn calls_containing(&self, fragment: &str) -> usize {
        self.lock()
            .prompts
            .iter()
            .filter(|p| p.contains(fragment))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    type Error = LlmError;

    async fn complete(&self, prompt: &str) -> Result<String, Self::Error> {
        let scripted = {
            let mut state = self.lock();
            state.prompts.push(prompt.to_string());
            state
                .rules
                .iter()
                .find(|(fragment, _)| prompt.contains(fragment.as_str()))
                .map(|(_, scripted)| scripted.clone())
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match scripted {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail) => Err(LlmError::Other("Mock error".to_string())),
            Some(Scripted::Error(error)) => Err(error),
            None => Ok(self.default_response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
