//! Chunk Extractor: one LLM call per chunk

use crate::chunking::Chunk;
use crate::error::PipelineError;
use crate::guard::guarded;
use crate::parser::parse_chunk_response;
use crate::prompt::ExtractionPrompt;
use crate::state::Stage;
use hcp_domain::{Candidate, Category, LlmProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Candidates pulled from one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Extracted candidates; empty when the chunk failed
    pub candidates: Vec<Candidate>,
    /// Why the chunk yielded nothing, if it failed
    pub failure: Option<String>,
}

impl ChunkOutcome {
    fn failed(reason: String) -> Self {
        Self {
            candidates: Vec::new(),
            failure: Some(reason),
        }
    }
}

/// Asks the LLM for every candidate value in one chunk.
///
/// Each chunk is submitted at most once; provider-level retries happen
/// inside the LLM client.
pub struct ChunkExtractor<L> {
    llm: Arc<L>,
    timeout: Duration,
}

impl<L: LlmProvider> ChunkExtractor<L> {
    /// Create an extractor with a per-call deadline
    pub fn new(llm: Arc<L>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Extract candidates from chunk `index` (zero based) of `total`.
    ///
    /// Call failures and unusable responses degrade this chunk only.
    pub async fn extract(
        &self,
        category: Category,
        entity: &str,
        chunk: &Chunk<'_>,
        index: usize,
        total: usize,
        cancel: &CancellationToken,
    ) -> Result<ChunkOutcome, PipelineError> {
        let prompt = ExtractionPrompt::new(category, entity, chunk, index, total).build();
        debug!(
            category = %category,
            chunk = index,
            sources = chunk.len(),
            tokens = chunk.estimated_tokens(),
            "Extracting chunk"
        );

        let response = match guarded(
            Stage::Extracting,
            self.timeout,
            cancel,
            self.llm.complete(&prompt),
        )
        .await?
        {
            Ok(response) => response,
            Err(reason) => {
                warn!(category = %category, chunk = index, reason = %reason, "Chunk extraction call failed");
                return Ok(ChunkOutcome::failed(format!(
                    "chunk {}: {}",
                    index + 1,
                    reason
                )));
            }
        };

        match parse_chunk_response(&response) {
            Ok(candidates) => {
                debug!(category = %category, chunk = index, candidates = candidates.len(), "Chunk extracted");
                Ok(ChunkOutcome {
                    candidates,
                    failure: None,
                })
            }
            Err(e) => {
                warn!(category = %category, chunk = index, error = %e, "Unusable chunk response");
                Ok(ChunkOutcome::failed(format!("chunk {}: {}", index + 1, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunker;
    use crate::tokens::WordCountEstimator;
    use hcp_domain::Evidence;
    use hcp_llm::MockProvider;

    const RESPONSE: &str = r#"{"chunk_results": [{"value": "+971 4 219 2000", "source_url": "https://dha.gov.ae"}]}"#;

    fn corpus() -> Vec<Evidence> {
        vec![Evidence::new("https://dha.gov.ae", "Call +971 4 219 2000")]
    }

    fn extractor(llm: MockProvider) -> ChunkExtractor<MockProvider> {
        ChunkExtractor::new(Arc::new(llm), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_fenced_response_matches_bare() {
        let evidence = corpus();
        let chunks = Chunker::new(1_000, Arc::new(WordCountEstimator)).chunk(&evidence);
        let cancel = CancellationToken::new();

        let bare = extractor(MockProvider::new(RESPONSE))
            .extract(Category::Phone, "Rashid Hospital", &chunks[0], 0, 1, &cancel)
            .await
            .unwrap();
        let wrapped = extractor(MockProvider::new(format!(
            "Sure! Here's the data: ```json {} ```",
            RESPONSE
        )))
        .extract(Category::Phone, "Rashid Hospital", &chunks[0], 0, 1, &cancel)
        .await
        .unwrap();

        assert_eq!(bare, wrapped);
        assert_eq!(bare.candidates[0].value, "+971 4 219 2000");
        assert!(bare.failure.is_none());
    }

    #[tokio::test]
    async fn test_prose_response_degrades_chunk() {
        let evidence = corpus();
        let chunks = Chunker::new(1_000, Arc::new(WordCountEstimator)).chunk(&evidence);

        let outcome = extractor(MockProvider::new("I could not find a phone number."))
            .extract(Category::Phone, "Rashid Hospital", &chunks[0], 1, 3, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.candidates.is_empty());
        assert!(outcome.failure.unwrap().starts_with("chunk 2:"));
    }

    #[tokio::test]
    async fn test_call_failure_degrades_chunk() {
        let evidence = corpus();
        let chunks = Chunker::new(1_000, Arc::new(WordCountEstimator)).chunk(&evidence);
        let llm = MockProvider::new(RESPONSE);
        llm.fail_when("Extract ALL");

        let outcome = extractor(llm.clone())
            .extract(Category::Phone, "Rashid Hospital", &chunks[0], 0, 1, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.candidates.is_empty());
        assert!(outcome.failure.is_some());
        assert_eq!(llm.call_count(), 1);
    }
}
