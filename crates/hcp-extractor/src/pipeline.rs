//! End-to-end research of one entity, or a batch of them

use crate::aggregator::{AggregationOutcome, Aggregator};
use crate::chunk_extractor::{ChunkExtractor, ChunkOutcome};
use crate::chunking::{Chunk, Chunker};
use crate::collector::{CategoryCollector, Corpus};
use crate::config::PipelineConfig;
use crate::coordinator::Coordinator;
use crate::error::PipelineError;
use crate::guard::ensure_active;
use crate::state::{RunState, RunTracker, Stage};
use crate::tokens::{TokenEstimator, WordCountEstimator};
use crate::types::{
    BatchFailure, BatchOutcome, CategoryReport, CategoryStatus, Coordination, ResearchReport,
};
use futures::{stream, StreamExt, TryStreamExt};
use hcp_domain::{AggregatedResult, Candidate, Category, LlmProvider, ScrapeProvider, SearchProvider};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extraction results of one category
#[derive(Debug, Default)]
struct Extracted {
    /// (chunk index, candidates), sorted by chunk index once all are in
    per_chunk: Vec<(usize, Vec<Candidate>)>,
    failures: Vec<String>,
}

impl Extracted {
    fn candidates(mut self) -> (Vec<Candidate>, Vec<String>) {
        self.per_chunk.sort_by_key(|(index, _)| *index);
        let candidates = self
            .per_chunk
            .into_iter()
            .flat_map(|(_, candidates)| candidates)
            .collect();
        (candidates, self.failures)
    }
}

/// Per-category bookkeeping carried from stage to stage
struct CategoryRun {
    evidence_count: usize,
    chunk_count: usize,
    candidates: Vec<Candidate>,
    collect_failure: Option<String>,
    extract_failures: Vec<String>,
}

/// Researches entities: collect, chunk, extract, aggregate, coordinate.
///
/// Generic over the three collaborators so tests can run the whole flow
/// against in-memory providers.
pub struct ResearchPipeline<S, P, L> {
    collector: CategoryCollector<S, P>,
    extractor: ChunkExtractor<L>,
    aggregator: Aggregator<L>,
    coordinator: Coordinator<L>,
    chunker: Chunker,
    llm: Arc<L>,
    config: Arc<PipelineConfig>,
}

impl<S, P, L> ResearchPipeline<S, P, L>
where
    S: SearchProvider + 'static,
    P: ScrapeProvider + 'static,
    L: LlmProvider + 'static,
{
    /// Create a pipeline; fails if `config` is invalid
    pub fn new(search: S, scraper: P, llm: L, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;

        let config = Arc::new(config);
        let llm = Arc::new(llm);
        let timeout = config.llm_timeout();

        Ok(Self {
            collector: CategoryCollector::new(Arc::new(search), Arc::new(scraper), Arc::clone(&config)),
            extractor: ChunkExtractor::new(Arc::clone(&llm), timeout),
            aggregator: Aggregator::new(Arc::clone(&llm), config.aggregation, timeout),
            coordinator: Coordinator::new(Arc::clone(&llm), config.coordination, timeout),
            chunker: Chunker::new(config.max_tokens, Arc::new(WordCountEstimator)),
            llm,
            config,
        })
    }

    /// Use a different token estimator for chunk sizing
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.chunker = Chunker::new(self.config.max_tokens, estimator);
        self
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Research one entity.
    ///
    /// Unit failures (a link, a chunk, a category) are reported inside the
    /// returned report. Only cancellation and fatal collaborator errors
    /// end the run with an error.
    pub async fn research(
        &self,
        entity: &str,
        cancel: &CancellationToken,
    ) -> Result<ResearchReport, PipelineError> {
        let entity = entity.trim();
        if entity.is_empty() {
            return Err(PipelineError::InvalidInput("entity name is empty".to_string()));
        }

        let run_id = Uuid::now_v7();
        let started = Instant::now();
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut tracker = RunTracker::new(run_id, entity);
        info!(run_id = %run_id, entity, "Starting research");

        match self.run(&mut tracker, entity, cancel).await {
            Ok((categories, coordination)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(run_id = %run_id, entity, elapsed_ms, "Research complete");
                Ok(ResearchReport {
                    run_id,
                    entity: entity.to_string(),
                    started_at,
                    elapsed_ms,
                    state: tracker.state(),
                    model: self.llm.model_name().to_string(),
                    categories,
                    coordination,
                })
            }
            Err(e) => {
                tracker.interrupt(&e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        tracker: &mut RunTracker,
        entity: &str,
        cancel: &CancellationToken,
    ) -> Result<(IndexMap<Category, CategoryReport>, Coordination), PipelineError> {
        ensure_active(cancel)?;
        tracker.advance(RunState::Collecting)?;
        let mut corpus = self.collector.collect(entity, cancel).await?;

        ensure_active(cancel)?;
        tracker.advance(RunState::Chunking)?;
        let dropped = corpus.normalize();
        if dropped > 0 {
            debug!(entity, dropped, "Normalized corpus");
        }
        let chunked = self.chunk_all(&corpus);

        ensure_active(cancel)?;
        tracker.advance(RunState::Extracting)?;
        let mut runs = self.extract_all(entity, &corpus, &chunked, cancel).await?;

        ensure_active(cancel)?;
        tracker.advance(RunState::Aggregating)?;
        let aggregated = self.aggregate_all(entity, &runs, cancel).await?;

        ensure_active(cancel)?;
        tracker.advance(RunState::Coordinating)?;
        let results: IndexMap<Category, AggregatedResult> = aggregated
            .iter()
            .map(|(category, outcome)| (*category, outcome.result.clone()))
            .collect();
        let coordination = self.coordinator.coordinate(entity, &results, cancel).await?;
        if let Coordination::Unparsed { error, .. } = &coordination {
            warn!(entity, error = %error, "Coordination fell back to raw results");
        }

        tracker.advance(RunState::Done)?;

        let mut categories = IndexMap::new();
        for (category, outcome) in aggregated {
            let Some(run) = runs.shift_remove(&category) else {
                continue;
            };
            categories.insert(category, category_report(run, outcome));
        }
        Ok((categories, coordination))
    }

    fn chunk_all<'a>(&self, corpus: &'a Corpus) -> IndexMap<Category, Vec<Chunk<'a>>> {
        corpus
            .categories()
            .map(|category| {
                let chunks = self.chunker.chunk(corpus.evidence(category));
                debug!(
                    category = %category,
                    evidence = corpus.evidence(category).len(),
                    chunks = chunks.len(),
                    "Chunked corpus"
                );
                (category, chunks)
            })
            .collect()
    }

    /// Run every chunk of every category through the extractor, at most
    /// `max_workers` calls at once
    async fn extract_all(
        &self,
        entity: &str,
        corpus: &Corpus,
        chunked: &IndexMap<Category, Vec<Chunk<'_>>>,
        cancel: &CancellationToken,
    ) -> Result<IndexMap<Category, CategoryRun>, PipelineError> {
        let jobs: Vec<(Category, usize, usize, &Chunk<'_>)> = chunked
            .iter()
            .flat_map(|(category, chunks)| {
                let total = chunks.len();
                chunks
                    .iter()
                    .enumerate()
                    .map(move |(index, chunk)| (*category, index, total, chunk))
            })
            .collect();
        debug!(entity, chunks = jobs.len(), "Extracting");

        let extractor = &self.extractor;
        let mut outcomes = stream::iter(jobs)
            .map(|(category, index, total, chunk)| async move {
                let outcome = extractor
                    .extract(category, entity, chunk, index, total, cancel)
                    .await;
                (category, index, outcome)
            })
            .buffer_unordered(self.config.max_workers);

        let mut extracted: IndexMap<Category, Extracted> = chunked
            .keys()
            .map(|category| (*category, Extracted::default()))
            .collect();
        while let Some((category, index, outcome)) = outcomes.next().await {
            let ChunkOutcome {
                candidates,
                failure,
            } = outcome?;
            let entry = extracted.entry(category).or_default();
            entry.per_chunk.push((index, candidates));
            entry.failures.extend(failure);
        }

        Ok(extracted
            .into_iter()
            .map(|(category, extracted)| {
                let chunk_count = chunked.get(&category).map_or(0, Vec::len);
                let (candidates, extract_failures) = extracted.candidates();
                let run = CategoryRun {
                    evidence_count: corpus.evidence(category).len(),
                    chunk_count,
                    candidates,
                    collect_failure: corpus.failure(category).map(str::to_string),
                    extract_failures,
                };
                (category, run)
            })
            .collect())
    }

    /// Aggregate every category, keeping category order
    async fn aggregate_all(
        &self,
        entity: &str,
        runs: &IndexMap<Category, CategoryRun>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(Category, AggregationOutcome)>, PipelineError> {
        let aggregator = &self.aggregator;
        stream::iter(runs.iter())
            .map(|(category, run)| async move {
                let outcome = aggregator
                    .aggregate(*category, entity, run.chunk_count, &run.candidates, cancel)
                    .await?;
                Ok::<_, PipelineError>((*category, outcome))
            })
            .buffered(self.config.max_workers)
            .try_collect()
            .await
    }

    /// Research several entities one after another.
    ///
    /// A failed entity becomes a [`BatchFailure`] row and the batch moves
    /// on. Cancellation records the interrupted entity and stops; entities
    /// after it are not attempted.
    pub async fn research_batch<I, N>(&self, names: I, cancel: &CancellationToken) -> Vec<BatchOutcome>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut outcomes = Vec::new();
        for name in names {
            let name = name.as_ref();
            if cancel.is_cancelled() {
                warn!(remaining_from = name, "Batch cancelled");
                break;
            }

            match self.research(name, cancel).await {
                Ok(report) => outcomes.push(BatchOutcome::Researched(Box::new(report))),
                Err(e) => {
                    warn!(entity = name, error = %e, "Research failed");
                    let stop = e.is_cancelled();
                    outcomes.push(BatchOutcome::Failed(BatchFailure::new(name, e.to_string())));
                    if stop {
                        break;
                    }
                }
            }
        }
        info!(
            researched = outcomes.iter().filter(|o| o.is_researched()).count(),
            failed = outcomes.iter().filter(|o| !o.is_researched()).count(),
            "Batch finished"
        );
        outcomes
    }
}

/// Combine stage outcomes into a category report; the earliest failed
/// stage wins
fn category_report(run: CategoryRun, outcome: AggregationOutcome) -> CategoryReport {
    let status = if let Some(reason) = run.collect_failure {
        CategoryStatus::Failed {
            stage: Stage::Collecting,
            reason,
        }
    } else if !run.extract_failures.is_empty() {
        CategoryStatus::Failed {
            stage: Stage::Extracting,
            reason: run.extract_failures.join("; "),
        }
    } else if let Some(reason) = outcome.failure {
        CategoryStatus::Failed {
            stage: Stage::Aggregating,
            reason,
        }
    } else {
        CategoryStatus::Completed
    };

    CategoryReport {
        status,
        evidence_count: run.evidence_count,
        chunk_count: run.chunk_count,
        candidate_count: run.candidates.len(),
        aggregated_by: outcome.method,
        aggregated: outcome.result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AggregationMethod;

    fn run() -> CategoryRun {
        CategoryRun {
            evidence_count: 3,
            chunk_count: 2,
            candidates: vec![Candidate::new("A", "u1")],
            collect_failure: None,
            extract_failures: Vec::new(),
        }
    }

    fn outcome(failure: Option<&str>) -> AggregationOutcome {
        AggregationOutcome {
            result: AggregatedResult::no_data(),
            method: AggregationMethod::Deterministic,
            failure: failure.map(str::to_string),
        }
    }

    #[test]
    fn test_extracted_candidates_follow_chunk_order() {
        let extracted = Extracted {
            per_chunk: vec![
                (2, vec![Candidate::new("C", "u3")]),
                (0, vec![Candidate::new("A", "u1")]),
                (1, vec![Candidate::new("B", "u2")]),
            ],
            failures: vec![],
        };
        let (candidates, _) = extracted.candidates();
        let values: Vec<&str> = candidates.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_report_completed() {
        let report = category_report(run(), outcome(None));
        assert!(report.status.is_completed());
        assert_eq!(report.candidate_count, 1);
        assert_eq!(report.chunk_count, 2);
    }

    #[test]
    fn test_collect_failure_takes_priority() {
        let mut failing = run();
        failing.collect_failure = Some("search failed".into());
        failing.extract_failures = vec!["chunk 1: timed out".into()];
        let report = category_report(failing, outcome(Some("rejected")));
        assert_eq!(
            report.status,
            CategoryStatus::Failed {
                stage: Stage::Collecting,
                reason: "search failed".into(),
            }
        );
    }

    #[test]
    fn test_extract_then_aggregate_failures() {
        let mut failing = run();
        failing.extract_failures = vec!["chunk 1: a".into(), "chunk 2: b".into()];
        let report = category_report(failing, outcome(Some("rejected")));
        assert_eq!(
            report.status,
            CategoryStatus::Failed {
                stage: Stage::Extracting,
                reason: "chunk 1: a; chunk 2: b".into(),
            }
        );

        let report = category_report(run(), outcome(Some("rejected")));
        assert!(matches!(
            report.status,
            CategoryStatus::Failed {
                stage: Stage::Aggregating,
                ..
            }
        ));
    }
}
