//! HCP Research Pipeline
//!
//! Researches a UAE hospital or clinic across a fixed set of data categories
//! and produces one structured record with per-field confidence.
//!
//! # Overview
//!
//! Each category gets its own web search and its own scraped corpus. The
//! corpus is split into token-bounded chunks, an LLM pulls candidate values
//! out of every chunk, the candidates are reduced to a most-common value,
//! and the coordinator joins the categories into an [`EntityRecord`].
//!
//! # Architecture
//!
//! ```text
//! Entity → Collector (search + scrape, per category)
//!        → Chunker → Chunk Extractor (LLM, per chunk)
//!        → Aggregator (per category) → Coordinator → ResearchReport
//! ```
//!
//! # Failure model
//!
//! - A failed link, chunk or category degrades only itself; the run still
//!   produces a record and the failure shows up in its `CategoryReport`
//! - Fatal collaborator errors (a missing or rejected API key) abort the run
//! - A `CancellationToken` is honored at every collaborator call and
//!   between stages
//!
//! # Example Usage
//!
//! ```no_run
//! use hcp_extractor::{PipelineConfig, ResearchPipeline};
//! use hcp_llm::MockProvider;
//! use hcp_sources::{StaticScraper, StaticSearch};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ResearchPipeline::new(
//!     StaticSearch::new(),
//!     StaticScraper::new(),
//!     MockProvider::default(),
//!     PipelineConfig::default(),
//! )?;
//!
//! let report = pipeline
//!     .research("Rashid Hospital", &CancellationToken::new())
//!     .await?;
//!
//! if let Some(record) = report.record() {
//!     for (field, value) in record.iter() {
//!         println!("{}: {} ({})", field, value.value, value.confidence);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`EntityRecord`]: hcp_domain::EntityRecord

#![warn(missing_docs)]

pub mod aggregator;
pub mod chunk_extractor;
pub mod chunking;
pub mod collector;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod state;
pub mod tokens;
pub mod types;

mod guard;

#[cfg(test)]
mod tests;

pub use aggregator::{fallback_aggregate, AggregationOutcome, Aggregator};
pub use chunk_extractor::{ChunkExtractor, ChunkOutcome};
pub use chunking::{Chunk, ChunkEntry, Chunker};
pub use collector::{CategoryCollector, Corpus, EvidenceLog};
pub use config::{PipelineConfig, StageMode};
pub use coordinator::{draft_record, Coordinator};
pub use error::PipelineError;
pub use parser::{lenient_json, ResponseError};
pub use pipeline::ResearchPipeline;
pub use state::{RunState, Stage};
pub use tokens::{TokenEstimator, WordCountEstimator};
pub use types::{
    AggregationMethod, BatchFailure, BatchOutcome, CategoryReport, CategoryStatus, Coordination,
    ResearchReport,
};
