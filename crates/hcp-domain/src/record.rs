//! The final per-entity record built by the coordinator

use crate::aggregate::{group_by_value, AggregatedResult};
use crate::category::Category;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence tier derived from cross-source agreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// Same value seen in 3 or more candidates
    High,
    /// Same value seen in exactly 2 candidates
    Medium,
    /// One candidate or no consensus
    Low,
}

impl Confidence {
    /// Tier for a most-common count
    pub fn from_count(count: usize) -> Self {
        match count {
            0 | 1 => Confidence::Low,
            2 => Confidence::Medium,
            _ => Confidence::High,
        }
    }

    /// Label used in JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that lost to the most common one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    /// Alternative value
    pub value: String,
    /// URLs claiming it
    #[serde(default)]
    pub source_urls: Vec<String>,
}

/// One field of the entity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Primary value
    pub value: String,
    /// URLs supporting the primary value
    #[serde(default)]
    pub source_urls: Vec<String>,
    /// Agreement tier
    pub confidence: Confidence,
    /// Other distinct values seen
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

impl FieldRecord {
    /// Derive a field from a category's aggregated result.
    ///
    /// Alternatives are every distinct value in `all_values` other than the
    /// winner, in first-seen order.
    pub fn from_aggregated(result: &AggregatedResult) -> Self {
        let winner = result.most_common.value.trim();
        let alternatives = group_by_value(&result.all_values)
            .into_iter()
            .filter(|group| group.value != winner)
            .map(|group| Alternative {
                value: group.value,
                source_urls: group.source_urls,
            })
            .collect();

        Self {
            value: result.most_common.value.clone(),
            source_urls: result.most_common.source_urls.clone(),
            confidence: Confidence::from_count(result.most_common.count),
            alternatives,
        }
    }
}

/// Structured research record, keyed by human-facing field name.
///
/// Serializes as a flat JSON object: `{"NETREVENUEYEARLY": {...}, "CEO": {...}, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord {
    fields: IndexMap<String, FieldRecord>,
}

impl EntityRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field for a category
    pub fn insert(&mut self, category: Category, field: FieldRecord) {
        self.fields.insert(category.field_name().to_string(), field);
    }

    /// Field for a category, if present
    pub fn get(&self, category: Category) -> Option<&FieldRecord> {
        self.fields.get(category.field_name())
    }

    /// Whether every category has a field
    pub fn is_complete(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_some())
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRecord)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
