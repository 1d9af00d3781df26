//! Trait definitions for external collaborators
//!
//! These traits define the boundaries between the research pipeline and the
//! services it depends on. Implementations live in other crates.

use crate::evidence::SearchHit;
use async_trait::async_trait;

/// Classification every collaborator error exposes to the pipeline.
///
/// The pipeline never inspects concrete provider errors; it only asks which
/// class a failure belongs to:
/// - transient failures are retried with backoff and then degrade one unit
/// - fatal failures abort the whole entity run
/// - everything else degrades the unit immediately
pub trait ProviderFailure: std::error::Error + Send + Sync + 'static {
    /// Timeouts, 5xx responses, connection resets, rate limits
    fn is_transient(&self) -> bool {
        false
    }

    /// HTTP 429 or an explicit quota response
    fn is_rate_limited(&self) -> bool {
        false
    }

    /// Missing or rejected credentials; no category can succeed
    fn is_fatal(&self) -> bool {
        false
    }
}

/// Web search collaborator
///
/// Implemented by the infrastructure layer (hcp-sources)
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Error type for search operations
    type Error: ProviderFailure;

    /// Return up to `max_results` ranked documents for `query`
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, Self::Error>;
}

/// Page content collaborator
///
/// Implemented by the infrastructure layer (hcp-sources)
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    /// Error type for scrape operations
    type Error: ProviderFailure;

    /// Fetch `url` and return its content normalized to plain text
    async fn scrape(&self, url: &str) -> Result<String, Self::Error>;
}

/// LLM completion collaborator
///
/// Implemented by the infrastructure layer (hcp-llm)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Error type for LLM operations
    type Error: ProviderFailure;

    /// Generate a completion for `prompt`
    async fn complete(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Model identifier, used in run metadata
    fn model_name(&self) -> &str {
        "llm"
    }
}
