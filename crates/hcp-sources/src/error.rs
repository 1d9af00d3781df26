//! Error types for search and scrape collaborators

use hcp_domain::ProviderFailure;
use thiserror::Error;

/// Errors raised by search and scrape providers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// No search API key was configured
    #[error("Search API key is not set (SERPER_API_KEY)")]
    MissingApiKey,

    /// The search API rejected the credentials
    #[error("Search API rejected credentials: HTTP {0}")]
    Unauthorized(u16),

    /// HTTP 429
    #[error("Rate limited by {0}")]
    RateLimited(String),

    /// HTTP 5xx
    #[error("Server error HTTP {status} from {url}")]
    Server {
        /// Response status
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Any other non-success status
    #[error("HTTP {status} for {url}")]
    Http {
        /// Response status
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Request exceeded its deadline
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The URL cannot be fetched
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Content type this scraper does not convert to text
    #[error("Unsupported content type {content_type} at {url}")]
    UnsupportedContent {
        /// Requested URL
        url: String,
        /// Reported or inferred content type
        content_type: String,
    },

    /// Page fetched but yielded no text
    #[error("No text content at {0}")]
    EmptyContent(String),
}

impl SourceError {
    /// Map a transport error for `url`
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout(url.to_string())
        } else if e.is_decode() {
            SourceError::InvalidResponse(e.to_string())
        } else {
            SourceError::Network(e.to_string())
        }
    }

    /// Map a non-success status for `url`
    pub(crate) fn from_status(url: &str, status: reqwest::StatusCode) -> Self {
        let code = status.as_u16();
        if code == 429 {
            SourceError::RateLimited(url.to_string())
        } else if status.is_server_error() {
            SourceError::Server {
                status: code,
                url: url.to_string(),
            }
        } else {
            SourceError::Http {
                status: code,
                url: url.to_string(),
            }
        }
    }
}

impl ProviderFailure for SourceError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited(_)
                | SourceError::Server { .. }
                | SourceError::Timeout(_)
                | SourceError::Network(_)
        )
    }

    fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited(_))
    }

    fn is_fatal(&self) -> bool {
        matches!(self, SourceError::MissingApiKey | SourceError::Unauthorized(_))
    }
}
