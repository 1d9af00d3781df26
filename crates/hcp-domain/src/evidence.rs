//! Search hits and the scraped evidence built from them

use serde::{Deserialize, Serialize};

/// One ranked document returned by a search provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document title
    #[serde(default)]
    pub title: String,
    /// Document URL; may be empty for answer-box style results
    #[serde(default)]
    pub link: String,
    /// Short excerpt shown by the search engine
    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    /// Create a new search hit
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
        }
    }

    /// Whether this hit points at something that can be scraped
    pub fn has_link(&self) -> bool {
        !self.link.trim().is_empty()
    }
}

/// Search metadata carried alongside scraped text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceMetadata {
    /// Title of the search hit
    #[serde(default)]
    pub title: String,
    /// Snippet of the search hit
    #[serde(default)]
    pub snippet: String,
}

/// One piece of scraped text plus the URL it came from.
///
/// Evidence is immutable once created; the chunker produces split views of
/// it rather than modifying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Plain text content of the page
    pub text: String,
    /// Source URL
    pub url: String,
    /// Search metadata
    #[serde(default)]
    pub metadata: EvidenceMetadata,
}

impl Evidence {
    /// Create evidence with empty metadata
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            metadata: EvidenceMetadata::default(),
        }
    }

    /// Create evidence from a search hit and the text scraped from its link
    pub fn from_hit(hit: &SearchHit, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: hit.link.clone(),
            metadata: EvidenceMetadata {
                title: hit.title.clone(),
                snippet: hit.snippet.clone(),
            },
        }
    }

    /// Evidence with no URL or no text carries nothing worth extracting
    pub fn is_usable(&self) -> bool {
        !self.url.trim().is_empty() && !self.text.trim().is_empty()
    }
}
