//! Aggregator: reduce a category's candidates to one ranked result

use crate::config::StageMode;
use crate::error::PipelineError;
use crate::guard::guarded;
use crate::parser::{parse_aggregation_response, ResponseError};
use crate::prompt::aggregation_prompt;
use crate::state::Stage;
use crate::types::AggregationMethod;
use hcp_domain::{
    group_by_value, AggregatedResult, Candidate, Category, LlmProvider, MostCommon,
    ValueGroup, DATA_FORMAT_ERROR, DATA_TYPE_ERROR,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exact-string frequency aggregation.
///
/// Values are grouped on their trimmed text; the highest count wins and
/// ties go to the value seen first. `all_values` keeps every non-empty
/// candidate in input order. The same input always yields the same result.
pub fn fallback_aggregate(candidates: &[Candidate]) -> AggregatedResult {
    let mut winner: Option<ValueGroup> = None;
    for group in group_by_value(candidates) {
        let beats = winner.as_ref().is_none_or(|best| group.count > best.count);
        if beats {
            winner = Some(group);
        }
    }

    let Some(winner) = winner else {
        return AggregatedResult::no_data();
    };

    AggregatedResult {
        most_common: MostCommon {
            value: winner.value,
            count: winner.count,
            source_urls: winner.source_urls,
        },
        all_values: candidates
            .iter()
            .filter(|c| !c.normalized_value().is_empty())
            .map(|c| Candidate::new(c.normalized_value(), c.source_url.clone()))
            .collect(),
    }
}

/// Aggregated result of one category and how it was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationOutcome {
    /// Final answer
    pub result: AggregatedResult,
    /// Procedure that produced `result`
    pub method: AggregationMethod,
    /// Why the LLM consensus was not used, when it was attempted and failed
    pub failure: Option<String>,
}

impl AggregationOutcome {
    fn new(result: AggregatedResult, method: AggregationMethod) -> Self {
        Self {
            result,
            method,
            failure: None,
        }
    }
}

/// Combines candidates from every chunk of a category.
///
/// With more than one chunk the LLM is asked for a consensus that can merge
/// near-duplicate spellings. Any failure there falls back to
/// [`fallback_aggregate`], so a result is always produced.
pub struct Aggregator<L> {
    llm: Arc<L>,
    mode: StageMode,
    timeout: Duration,
}

impl<L: LlmProvider> Aggregator<L> {
    /// Create an aggregator
    pub fn new(llm: Arc<L>, mode: StageMode, timeout: Duration) -> Self {
        Self { llm, mode, timeout }
    }

    /// Aggregate the candidates extracted from `chunk_count` chunks
    pub async fn aggregate(
        &self,
        category: Category,
        entity: &str,
        chunk_count: usize,
        candidates: &[Candidate],
        cancel: &CancellationToken,
    ) -> Result<AggregationOutcome, PipelineError> {
        if chunk_count == 0 || candidates.is_empty() {
            debug!(category = %category, chunks = chunk_count, "Nothing to aggregate");
            return Ok(AggregationOutcome::new(
                AggregatedResult::no_data(),
                AggregationMethod::Sentinel,
            ));
        }

        if chunk_count == 1 || self.mode == StageMode::Deterministic {
            return Ok(AggregationOutcome::new(
                fallback_aggregate(candidates),
                AggregationMethod::Deterministic,
            ));
        }

        let prompt = aggregation_prompt(category, entity, candidates);
        let rejection = match guarded(
            Stage::Aggregating,
            self.timeout,
            cancel,
            self.llm.complete(&prompt),
        )
        .await?
        {
            Ok(response) => match parse_aggregation_response(&response, candidates.len()) {
                Ok(result) => {
                    debug!(
                        category = %category,
                        value = %result.most_common.value,
                        count = result.most_common.count,
                        "LLM consensus accepted"
                    );
                    return Ok(AggregationOutcome::new(result, AggregationMethod::Llm));
                }
                Err(e) => Rejection::Response(e),
            },
            Err(reason) => Rejection::Call(reason),
        };

        warn!(category = %category, reason = %rejection, "Falling back to frequency aggregation");
        let result = fallback_aggregate(candidates);
        let result = if result.is_sentinel() {
            rejection.sentinel()
        } else {
            result
        };
        Ok(AggregationOutcome {
            result,
            method: AggregationMethod::Deterministic,
            failure: Some(rejection.to_string()),
        })
    }
}

enum Rejection {
    Call(String),
    Response(ResponseError),
}

impl Rejection {
    /// Sentinel used when the fallback has nothing to count either
    fn sentinel(&self) -> AggregatedResult {
        match self {
            Rejection::Response(ResponseError::NotAnObject(_)) => {
                AggregatedResult::sentinel(DATA_TYPE_ERROR)
            }
            Rejection::Response(_) => AggregatedResult::sentinel(DATA_FORMAT_ERROR),
            Rejection::Call(_) => AggregatedResult::no_data(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Call(reason) => write!(f, "aggregation call failed: {}", reason),
            Rejection::Response(e) => write!(f, "aggregation response rejected: {}", e),
        }
    }
}
