//! Per-category aggregated results and sentinel values

use crate::candidate::Candidate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Sentinel value for a category with no candidates
pub const NO_DATA: &str = "No data available";

/// Sentinel value for an aggregation result that could not be parsed
pub const DATA_FORMAT_ERROR: &str = "Data format error";

/// Sentinel value for an aggregation result of the wrong JSON type
pub const DATA_TYPE_ERROR: &str = "Data type error";

/// The most frequently claimed value for a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostCommon {
    /// The selected value
    pub value: String,
    /// Number of candidates that claimed it
    pub count: usize,
    /// Distinct URLs supporting it, first seen first
    #[serde(default)]
    pub source_urls: Vec<String>,
}

/// Candidates of one category reduced to a ranked answer.
///
/// JSON shape:
/// `{"most_common": {"value", "count", "source_urls"}, "all_values": [{"value", "source_url"}]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Winning value
    pub most_common: MostCommon,
    /// Every candidate that contributed
    #[serde(default)]
    pub all_values: Vec<Candidate>,
}

/// One distinct value with its count and supporting URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueGroup {
    /// Normalized value
    pub value: String,
    /// Number of candidates carrying the value
    pub count: usize,
    /// Distinct non-empty URLs, first seen first
    pub source_urls: Vec<String>,
}

impl AggregatedResult {
    /// Result for a category where nothing was found
    pub fn no_data() -> Self {
        Self::sentinel(NO_DATA)
    }

    /// Result carrying one of the sentinel values with a zero count
    pub fn sentinel(value: &str) -> Self {
        Self {
            most_common: MostCommon {
                value: value.to_string(),
                count: 0,
                source_urls: Vec::new(),
            },
            all_values: Vec::new(),
        }
    }

    /// Whether the winning value is one of the sentinels
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self.most_common.value.as_str(),
            NO_DATA | DATA_FORMAT_ERROR | DATA_TYPE_ERROR
        )
    }

    /// Check a result produced outside the deterministic path.
    ///
    /// `candidate_total` is the number of candidates the result was built
    /// from; a count above it cannot be genuine.
    pub fn validate(&self, candidate_total: usize) -> Result<(), String> {
        if self.most_common.value.trim().is_empty() {
            return Err("most_common.value is empty".to_string());
        }
        if self.most_common.count > candidate_total {
            return Err(format!(
                "most_common.count {} exceeds candidate total {}",
                self.most_common.count, candidate_total
            ));
        }
        Ok(())
    }
}

/// Group candidates by trimmed value.
///
/// Groups come back in first-seen order; empty values are skipped.
pub fn group_by_value<'a, I>(candidates: I) -> Vec<ValueGroup>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    let mut groups: IndexMap<&'a str, ValueGroup> = IndexMap::new();

    for candidate in candidates {
        let value = candidate.normalized_value();
        if value.is_empty() {
            continue;
        }
        let group = groups.entry(value).or_insert_with(|| ValueGroup {
            value: value.to_string(),
            count: 0,
            source_urls: Vec::new(),
        });
        group.count += 1;

        let url = candidate.source_url.trim();
        if !url.is_empty() && !group.source_urls.iter().any(|u| u == url) {
            group.source_urls.push(url.to_string());
        }
    }

    groups.into_values().collect()
}
