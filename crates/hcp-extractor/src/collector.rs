//! Category Collector: search and scrape every category concurrently

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::guard::guarded;
use crate::state::Stage;
use futures::{stream, FutureExt, StreamExt};
use hcp_domain::{Category, Evidence, ScrapeProvider, SearchHit, SearchProvider};
use indexmap::IndexMap;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Append-only evidence list for one category.
///
/// The lock is held for a single push and never across an await.
#[derive(Debug, Default)]
pub struct EvidenceLog {
    items: Mutex<Vec<Evidence>>,
}

impl EvidenceLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one evidence item
    pub fn append(&self, evidence: Evidence) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(evidence);
    }

    /// Number of items appended so far
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the items, in append order
    pub fn snapshot(&self) -> Vec<Evidence> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Evidence gathered for one entity, one bucket per category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    buckets: IndexMap<Category, Vec<Evidence>>,
    failures: IndexMap<Category, String>,
}

impl Corpus {
    /// Corpus with an empty bucket for each category
    pub fn new(categories: &[Category]) -> Self {
        Self {
            buckets: categories.iter().map(|c| (*c, Vec::new())).collect(),
            failures: IndexMap::new(),
        }
    }

    /// Evidence collected for `category`, in discovery order
    pub fn evidence(&self, category: Category) -> &[Evidence] {
        self.buckets
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Why collection for `category` failed, if it did
    pub fn failure(&self, category: Category) -> Option<&str> {
        self.failures.get(&category).map(String::as_str)
    }

    /// Categories in bucket order
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.buckets.keys().copied()
    }

    /// Total evidence items across all categories
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether no category has any evidence
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace a category's evidence
    pub fn set_evidence(&mut self, category: Category, evidence: Vec<Evidence>) {
        self.buckets.insert(category, evidence);
    }

    /// Record a collection failure for a category
    pub fn set_failure(&mut self, category: Category, reason: impl Into<String>) {
        self.failures.insert(category, reason.into());
    }

    /// Drop evidence without a URL or without text; returns how many were
    /// dropped
    pub fn normalize(&mut self) -> usize {
        let mut dropped = 0;
        for (category, items) in self.buckets.iter_mut() {
            let before = items.len();
            items.retain(Evidence::is_usable);
            let removed = before - items.len();
            if removed > 0 {
                debug!(category = %category, removed, "Dropped evidence without text or URL");
            }
            dropped += removed;
        }
        dropped
    }
}

type TaskOutcome = Result<Result<(), String>, PipelineError>;

/// A category task's outcome, or the payload it panicked with
type CaughtOutcome = Result<TaskOutcome, Box<dyn Any + Send>>;

/// Folds finished category tasks into a corpus.
///
/// Categories whose task never reports back are marked failed by `finish`.
struct Settlement {
    corpus: Corpus,
    pending: Vec<Category>,
}

impl Settlement {
    fn new(categories: &[Category]) -> Self {
        Self {
            corpus: Corpus::new(categories),
            pending: categories.to_vec(),
        }
    }

    /// Record one joined task; fatal collaborator errors are handed back
    fn record(
        &mut self,
        joined: Result<(Category, CaughtOutcome), JoinError>,
    ) -> Result<(), PipelineError> {
        let (category, outcome) = match joined {
            Ok(finished) => finished,
            Err(e) => {
                error!(error = %e, "Category task did not finish");
                return Ok(());
            }
        };
        self.pending.retain(|c| *c != category);

        match outcome {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(reason))) => {
                warn!(category = %category, reason = %reason, "Category collection failed");
                self.corpus.set_failure(category, reason);
            }
            Ok(Err(fatal)) => return Err(fatal),
            Err(panic) => {
                let reason = format!("category task panicked: {}", panic_message(panic.as_ref()));
                error!(category = %category, reason = %reason, "Category collection failed");
                self.corpus.set_failure(category, reason);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Corpus {
        for category in self.pending {
            error!(category = %category, "Category collection failed");
            self.corpus.set_failure(category, "category task did not finish");
        }
        self.corpus
    }
}

/// Runs search and scrape for every configured category.
///
/// One task per category runs on a `JoinSet`; a semaphore bounds how many
/// run at once. Pages inside a category are fetched concurrently up to
/// `scrape_concurrency` and appended in completion order.
pub struct CategoryCollector<S, P> {
    search: Arc<S>,
    scraper: Arc<P>,
    config: Arc<PipelineConfig>,
}

impl<S, P> CategoryCollector<S, P>
where
    S: SearchProvider + 'static,
    P: ScrapeProvider + 'static,
{
    /// Create a collector over shared providers
    pub fn new(search: Arc<S>, scraper: Arc<P>, config: Arc<PipelineConfig>) -> Self {
        Self {
            search,
            scraper,
            config,
        }
    }

    /// Collect evidence for every configured category.
    ///
    /// Returns after every category task has finished. A category whose
    /// search fails, or whose task panics, keeps whatever evidence it had
    /// appended and is recorded as failed. Fatal collaborator errors and
    /// cancellation stop all remaining tasks and end the run.
    pub async fn collect(
        &self,
        entity: &str,
        cancel: &CancellationToken,
    ) -> Result<Corpus, PipelineError> {
        let categories = self.config.categories.clone();
        let logs: IndexMap<Category, Arc<EvidenceLog>> = categories
            .iter()
            .map(|c| (*c, Arc::new(EvidenceLog::new())))
            .collect();
        let permits = Arc::new(Semaphore::new(self.config.max_workers));
        let mut tasks = JoinSet::new();

        for (category, log) in &logs {
            let category = *category;
            let task = collect_category(
                Arc::clone(&self.search),
                Arc::clone(&self.scraper),
                Arc::clone(&self.config),
                Arc::clone(&permits),
                entity.to_string(),
                category,
                Arc::clone(log),
                cancel.clone(),
            );
            tasks.spawn(async move { (category, AssertUnwindSafe(task).catch_unwind().await) });
        }

        let mut settlement = Settlement::new(&categories);
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(PipelineError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            if let Err(fatal) = settlement.record(joined) {
                tasks.abort_all();
                return Err(fatal);
            }
        }

        let mut corpus = settlement.finish();
        for (category, log) in &logs {
            corpus.set_evidence(*category, log.snapshot());
        }
        info!(
            entity,
            evidence = corpus.len(),
            failed = corpus.failures.len(),
            "Collection finished"
        );
        Ok(corpus)
    }
}

#[allow(clippy::too_many_arguments)]
async fn collect_category<S, P>(
    search: Arc<S>,
    scraper: Arc<P>,
    config: Arc<PipelineConfig>,
    permits: Arc<Semaphore>,
    entity: String,
    category: Category,
    log: Arc<EvidenceLog>,
    cancel: CancellationToken,
) -> TaskOutcome
where
    S: SearchProvider,
    P: ScrapeProvider,
{
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return Ok(Err("worker pool closed".to_string())),
        },
    };

    let query = category.search_query(&entity);
    debug!(category = %category, query = %query, "Searching");
    let hits = match guarded(
        Stage::Collecting,
        config.search_timeout(),
        &cancel,
        search.search(&query, config.results_per_category),
    )
    .await?
    {
        Ok(hits) => hits,
        Err(reason) => return Ok(Err(format!("search failed: {}", reason))),
    };

    let links: Vec<SearchHit> = hits.into_iter().filter(SearchHit::has_link).collect();
    debug!(category = %category, links = links.len(), "Scraping search results");

    let scraper = scraper.as_ref();
    let cancel = &cancel;
    let scrape_timeout = config.scrape_timeout();
    let mut fetches = stream::iter(links)
        .map(move |hit| async move {
            let fetch = guarded(
                Stage::Collecting,
                scrape_timeout,
                cancel,
                scraper.scrape(&hit.link),
            );
            let outcome = AssertUnwindSafe(fetch).catch_unwind().await;
            (hit, outcome)
        })
        .buffer_unordered(config.scrape_concurrency);

    while let Some((hit, outcome)) = fetches.next().await {
        let reason = match outcome {
            Ok(fetched) => match fetched? {
                Ok(text) => {
                    log.append(Evidence::from_hit(&hit, text));
                    continue;
                }
                Err(reason) => reason,
            },
            Err(panic) => format!("scraper panicked: {}", panic_message(panic.as_ref())),
        };
        warn!(category = %category, url = %hit.link, reason = %reason, "Skipping link");
    }

    debug!(category = %category, evidence = log.len(), "Category collected");
    Ok(Ok(()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
