//! Error types for the research pipeline

use crate::state::{RunState, Stage};
use thiserror::Error;

/// Errors that end an entity run.
///
/// Per-link, per-chunk and per-category failures never surface here; they
/// degrade their unit and are reported in the run's `CategoryReport`s.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A collaborator failure no category could recover from
    #[error("Fatal {stage} error: {message}")]
    Fatal {
        /// Stage that hit the failure
        stage: Stage,
        /// Collaborator error message
        message: String,
    },

    /// The caller cancelled the run
    #[error("Research cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unusable caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// State machine violation
    #[error("Invalid run state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: RunState,
        /// Requested state
        to: RunState,
    },
}

impl PipelineError {
    /// Whether the run ended because of a cancellation request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}
