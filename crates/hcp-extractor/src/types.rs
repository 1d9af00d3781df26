//! Run reports and stage outcomes

use crate::state::{RunState, Stage};
use hcp_domain::{AggregatedResult, Category, EntityRecord};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one category across the whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CategoryStatus {
    /// Every stage ran normally
    Completed,
    /// A stage failed; the category carries whatever survived
    Failed {
        /// First stage that failed
        stage: Stage,
        /// Failure description
        reason: String,
    },
}

impl CategoryStatus {
    /// Whether the category finished without a failed stage
    pub fn is_completed(&self) -> bool {
        matches!(self, CategoryStatus::Completed)
    }
}

/// How a category's aggregated result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    /// No candidates: the no-data sentinel
    Sentinel,
    /// Exact-string grouping and counting
    Deterministic,
    /// Accepted LLM consensus
    Llm,
}

/// Per-category run details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReport {
    /// Stage outcome
    #[serde(flatten)]
    pub status: CategoryStatus,
    /// Evidence items that reached the chunker
    pub evidence_count: usize,
    /// Chunks submitted for extraction
    pub chunk_count: usize,
    /// Candidates extracted across all chunks
    pub candidate_count: usize,
    /// How `aggregated` was produced
    pub aggregated_by: AggregationMethod,
    /// Final per-category answer
    pub aggregated: AggregatedResult,
}

/// Result of the coordination step.
///
/// Serialized untagged: either the record itself, or an object carrying the
/// raw per-category results plus an error marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordination {
    /// Structured per-field record
    Integrated(EntityRecord),
    /// Coordination output could not be used
    Unparsed {
        /// Aggregated results keyed by field name
        raw_results: IndexMap<String, AggregatedResult>,
        /// What went wrong
        error: String,
        /// Collaborator output, when there was any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
    },
}

impl Coordination {
    /// The record, if coordination succeeded
    pub fn record(&self) -> Option<&EntityRecord> {
        match self {
            Coordination::Integrated(record) => Some(record),
            Coordination::Unparsed { .. } => None,
        }
    }
}

/// Everything produced by one entity research run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchReport {
    /// Time-ordered run identifier
    pub run_id: Uuid,
    /// Entity researched
    pub entity: String,
    /// Run start, seconds since the Unix epoch
    pub started_at: u64,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
    /// Final run state
    pub state: RunState,
    /// LLM model identifier
    pub model: String,
    /// Per-category details, in configured category order
    pub categories: IndexMap<Category, CategoryReport>,
    /// Final record
    pub coordination: Coordination,
}

impl ResearchReport {
    /// The record, if coordination succeeded
    pub fn record(&self) -> Option<&EntityRecord> {
        self.coordination.record()
    }

    /// Categories that ended in a failed stage
    pub fn failed_categories(&self) -> impl Iterator<Item = (&Category, &CategoryReport)> {
        self.categories
            .iter()
            .filter(|(_, report)| !report.status.is_completed())
    }
}

/// Row emitted for an entity whose run ended in an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Entity name
    #[serde(rename = "HCP NAME")]
    pub name: String,
    /// Always "Error"
    #[serde(rename = "STATUS")]
    pub status: String,
    /// Error description
    #[serde(rename = "ERROR_MESSAGE")]
    pub error: String,
}

impl BatchFailure {
    /// Failure row for `name`
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: "Error".to_string(),
            error: error.into(),
        }
    }
}

/// Outcome for one entity of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    /// Run completed
    Researched(Box<ResearchReport>),
    /// Run ended in an error
    Failed(BatchFailure),
}

impl BatchOutcome {
    /// Entity name
    pub fn name(&self) -> &str {
        match self {
            BatchOutcome::Researched(report) => &report.entity,
            BatchOutcome::Failed(failure) => &failure.name,
        }
    }

    /// Whether the run completed
    pub fn is_researched(&self) -> bool {
        matches!(self, BatchOutcome::Researched(_))
    }
}
