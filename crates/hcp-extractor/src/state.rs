//! Run state machine

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle of one entity research run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Created, nothing started
    Pending,
    /// Category tasks are searching and scraping
    Collecting,
    /// Corpora are being split into chunks
    Chunking,
    /// Chunk extraction calls are running
    Extracting,
    /// Candidates are being reduced per category
    Aggregating,
    /// Categories are being merged into one record
    Coordinating,
    /// Finished with a record
    Done,
    /// Stopped by the caller
    Cancelled,
    /// Stopped by a fatal collaborator error
    Aborted,
}

impl RunState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Cancelled | RunState::Aborted)
    }

    /// Whether `next` may follow `self`.
    ///
    /// Stages advance strictly in order; any non-terminal state may end in
    /// `Cancelled` or `Aborted`.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (current, Cancelled | Aborted) => !current.is_terminal(),
            (Pending, Collecting)
            | (Collecting, Chunking)
            | (Chunking, Extracting)
            | (Extracting, Aggregating)
            | (Aggregating, Coordinating)
            | (Coordinating, Done) => true,
            _ => false,
        }
    }

    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Collecting => "collecting",
            RunState::Chunking => "chunking",
            RunState::Extracting => "extracting",
            RunState::Aggregating => "aggregating",
            RunState::Coordinating => "coordinating",
            RunState::Done => "done",
            RunState::Cancelled => "cancelled",
            RunState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage a unit failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Search and scrape
    Collecting,
    /// Per-chunk extraction
    Extracting,
    /// Cross-chunk aggregation
    Aggregating,
    /// Record coordination
    Coordinating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Collecting => "collecting",
            Stage::Extracting => "extracting",
            Stage::Aggregating => "aggregating",
            Stage::Coordinating => "coordinating",
        };
        f.write_str(label)
    }
}

/// Tracks and logs the state of one run
#[derive(Debug)]
pub(crate) struct RunTracker {
    run_id: Uuid,
    entity: String,
    state: RunState,
}

impl RunTracker {
    pub(crate) fn new(run_id: Uuid, entity: impl Into<String>) -> Self {
        Self {
            run_id,
            entity: entity.into(),
            state: RunState::Pending,
        }
    }

    pub(crate) fn state(&self) -> RunState {
        self.state
    }

    /// Move to `next`, rejecting out-of-order transitions
    pub(crate) fn advance(&mut self, next: RunState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        info!(
            run_id = %self.run_id,
            entity = %self.entity,
            from = %self.state,
            to = %next,
            "Run state changed"
        );
        self.state = next;
        Ok(())
    }

    /// Record the terminal state matching `error`
    pub(crate) fn interrupt(&mut self, error: &PipelineError) {
        let next = if error.is_cancelled() {
            RunState::Cancelled
        } else {
            RunState::Aborted
        };
        if self.state.can_transition_to(next) {
            warn!(
                run_id = %self.run_id,
                entity = %self.entity,
                from = %self.state,
                to = %next,
                error = %error,
                "Run interrupted"
            );
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_order() {
        let mut tracker = RunTracker::new(Uuid::now_v7(), "Rashid Hospital");
        for next in [
            RunState::Collecting,
            RunState::Chunking,
            RunState::Extracting,
            RunState::Aggregating,
            RunState::Coordinating,
            RunState::Done,
        ] {
            tracker.advance(next).unwrap();
        }
        assert_eq!(tracker.state(), RunState::Done);
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut tracker = RunTracker::new(Uuid::now_v7(), "x");
        tracker.advance(RunState::Collecting).unwrap();
        let err = tracker.advance(RunState::Extracting).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidTransition {
                from: RunState::Collecting,
                to: RunState::Extracting,
            }
        );
        assert_eq!(tracker.state(), RunState::Collecting);
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!RunState::Done.can_transition_to(RunState::Cancelled));
        assert!(!RunState::Aborted.can_transition_to(RunState::Collecting));
        assert!(RunState::Extracting.can_transition_to(RunState::Aborted));
        assert!(RunState::Pending.can_transition_to(RunState::Cancelled));
    }

    #[test]
    fn test_interrupt_picks_terminal_state() {
        let mut tracker = RunTracker::new(Uuid::now_v7(), "x");
        tracker.advance(RunState::Collecting).unwrap();
        tracker.interrupt(&PipelineError::Cancelled);
        assert_eq!(tracker.state(), RunState::Cancelled);

        let mut tracker = RunTracker::new(Uuid::now_v7(), "x");
        tracker.interrupt(&PipelineError::Fatal {
            stage: Stage::Collecting,
            message: "bad key".into(),
        });
        assert_eq!(tracker.state(), RunState::Aborted);
    }
}
