//! HCP Research Domain Layer
//!
//! This crate contains the value objects and collaborator interfaces shared by
//! every other crate in the workspace. It performs no network or file I/O of
//! its own.
//!
//! ## Key Concepts
//!
//! - **Category**: One tracked data field (revenue, doctors, CEO, ...)
//! - **Evidence**: Scraped text plus the URL it came from
//! - **Candidate**: One `(value, source_url)` claim pulled out of a chunk
//! - **AggregatedResult**: Candidates reduced to a most-common value
//! - **EntityRecord**: The final per-field record with confidence tiers
//!
//! ## Architecture
//!
//! - Value objects are plain data with serde derives matching the JSON
//!   shapes exchanged between pipeline stages
//! - Search, scrape and LLM collaborators are traits; implementations live
//!   in `hcp-sources` and `hcp-llm`
//! - The retry policy lives here so both collaborator crates share one
//!   backoff implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod candidate;
pub mod category;
pub mod evidence;
pub mod record;
pub mod retry;
pub mod traits;

// Re-exports for convenience
pub use aggregate::{
    group_by_value, AggregatedResult, MostCommon, ValueGroup, DATA_FORMAT_ERROR, DATA_TYPE_ERROR,
    NO_DATA,
};
pub use candidate::Candidate;
pub use category::{Category, UnknownCategory};
pub use evidence::{Evidence, EvidenceMetadata, SearchHit};
pub use record::{Alternative, Confidence, EntityRecord, FieldRecord};
pub use retry::RetryPolicy;
pub use traits::{LlmProvider, ProviderFailure, ScrapeProvider, SearchProvider};
