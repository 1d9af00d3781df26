//! Coordinator: merge per-category results into one entity record

use crate::config::StageMode;
use crate::error::PipelineError;
use crate::guard::guarded;
use crate::parser::parse_coordination_response;
use crate::prompt::coordination_prompt;
use crate::state::Stage;
use crate::types::Coordination;
use hcp_domain::{AggregatedResult, Alternative, Category, EntityRecord, FieldRecord, LlmProvider};
use indexmap::IndexMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Record built straight from the aggregated results: confidence from the
/// most-common count, alternatives from `all_values`.
pub fn draft_record(results: &IndexMap<Category, AggregatedResult>) -> EntityRecord {
    let mut record = EntityRecord::new();
    for (category, result) in results {
        record.insert(*category, FieldRecord::from_aggregated(result));
    }
    record
}

/// One field as rendered by the LLM; confidence is never taken from it
#[derive(Debug, Deserialize)]
struct RenderedField {
    value: String,
    #[serde(default)]
    source_urls: Vec<String>,
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

/// Builds the final record for an entity
pub struct Coordinator<L> {
    llm: Arc<L>,
    mode: StageMode,
    timeout: Duration,
}

impl<L: LlmProvider> Coordinator<L> {
    /// Create a coordinator
    pub fn new(llm: Arc<L>, mode: StageMode, timeout: Duration) -> Self {
        Self { llm, mode, timeout }
    }

    /// Coordinate the aggregated results of every category.
    ///
    /// In LLM mode the rendered fields replace the draft's value, URLs and
    /// alternatives; confidence always comes from the counts. Fields the
    /// response omits or garbles keep their draft. A failed call or an
    /// unparseable response yields [`Coordination::Unparsed`].
    pub async fn coordinate(
        &self,
        entity: &str,
        results: &IndexMap<Category, AggregatedResult>,
        cancel: &CancellationToken,
    ) -> Result<Coordination, PipelineError> {
        let draft = draft_record(results);
        if self.mode == StageMode::Deterministic {
            debug!(entity, fields = draft.len(), "Deterministic coordination");
            return Ok(Coordination::Integrated(draft));
        }

        let prompt = coordination_prompt(entity, results);
        let response = match guarded(
            Stage::Coordinating,
            self.timeout,
            cancel,
            self.llm.complete(&prompt),
        )
        .await?
        {
            Ok(response) => response,
            Err(reason) => {
                warn!(entity, reason = %reason, "Coordination call failed");
                return Ok(unparsed(
                    results,
                    format!("Coordination call failed: {}", reason),
                    None,
                ));
            }
        };

        let fields = match parse_coordination_response(&response) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(entity, error = %e, "Could not parse coordinator result");
                return Ok(unparsed(
                    results,
                    format!("Could not parse coordinator result: {}", e),
                    Some(response),
                ));
            }
        };

        let mut record = EntityRecord::new();
        let mut kept_draft = 0;
        for category in results.keys() {
            let Some(drafted) = draft.get(*category) else {
                continue;
            };
            let rendered = fields
                .get(category.field_name())
                .cloned()
                .and_then(|value| serde_json::from_value::<RenderedField>(value).ok())
                .filter(|field| !field.value.trim().is_empty());

            let field = match rendered {
                Some(field) => FieldRecord {
                    value: field.value,
                    source_urls: field.source_urls,
                    confidence: drafted.confidence,
                    alternatives: field.alternatives,
                },
                None => {
                    kept_draft += 1;
                    drafted.clone()
                }
            };
            record.insert(*category, field);
        }

        if kept_draft > 0 {
            warn!(entity, fields = kept_draft, "Coordinator response missed fields; kept drafts");
        }
        info!(entity, fields = record.len(), "Coordination complete");
        Ok(Coordination::Integrated(record))
    }
}

fn unparsed(
    results: &IndexMap<Category, AggregatedResult>,
    error: String,
    raw_response: Option<String>,
) -> Coordination {
    Coordination::Unparsed {
        raw_results: results
            .iter()
            .map(|(category, result)| (category.field_name().to_string(), result.clone()))
            .collect(),
        error,
        raw_response,
    }
}
