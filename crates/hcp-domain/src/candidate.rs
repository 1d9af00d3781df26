//! Candidate values extracted from a single chunk

use serde::{Deserialize, Serialize};

/// One `(value, source_url)` claim extracted from one chunk.
///
/// Several candidates may carry the same value from different URLs; that
/// repetition is exactly what the aggregator counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Extracted value, as phrased by the source
    pub value: String,
    /// URL of the evidence the value came from
    #[serde(default)]
    pub source_url: String,
}

impl Candidate {
    /// Create a new candidate
    pub fn new(value: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source_url: source_url.into(),
        }
    }

    /// Grouping key: the value with surrounding whitespace removed
    pub fn normalized_value(&self) -> &str {
        self.value.trim()
    }
}
