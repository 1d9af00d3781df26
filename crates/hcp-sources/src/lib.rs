//! HCP Research Search and Scrape Providers
//!
//! Implementations of the `SearchProvider` and `ScrapeProvider` traits from
//! `hcp-domain`.
//!
//! - `SerperSearch`: Google results through the Serper API, localized to a
//!   search region
//! - `HttpScraper`: Static HTML pages converted to plain text
//! - `StaticSearch` / `StaticScraper`: In-memory tables for tests
//!
//! All providers report failures as `SourceError`, classified as transient,
//! rate limited or fatal through `ProviderFailure`.

#![warn(missing_docs)]

pub mod error;
pub mod mock;
pub mod scrape;
pub mod serper;

pub use error::SourceError;
pub use mock::{StaticScraper, StaticSearch};
pub use scrape::{html_to_text, HttpScraper};
pub use serper::{SearchRegion, SerperSearch};
