//! Command implementations.

pub mod batch;
pub mod config;
pub mod research;

pub use self::batch::execute_batch;
pub use self::config::execute_config;
pub use self::research::execute_research;

use crate::cli::KeyArgs;
use crate::config::Config;
use crate::error::Result;
use crate::providers::{self, LlmBackend};
use hcp_extractor::ResearchPipeline;
use hcp_sources::{HttpScraper, SerperSearch};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Pipeline wired to the live collaborators
pub type LivePipeline = ResearchPipeline<SerperSearch, HttpScraper, LlmBackend>;

/// Build the research pipeline from configuration and credentials.
pub fn build_pipeline(config: &Config, keys: &KeyArgs) -> Result<LivePipeline> {
    let search = providers::search_provider(config, keys)?;
    let scraper = providers::scrape_provider(config)?;
    let llm = providers::llm_provider(config, keys)?;
    Ok(ResearchPipeline::new(search, scraper, llm, config.pipeline.clone())?)
}

/// Write `value` as pretty JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
