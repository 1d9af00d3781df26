//! Research command implementation.

use super::{build_pipeline, write_json};
use crate::cli::ResearchArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Execute the research command.
pub async fn execute_research(
    args: ResearchArgs,
    config: &Config,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> Result<()> {
    if args.name.trim().is_empty() {
        return Err(CliError::InvalidInput("Entity name is empty".to_string()));
    }

    let pipeline = build_pipeline(config, &args.keys)?;
    let report = pipeline.research(&args.name, cancel).await?;
    info!(entity = %report.entity, elapsed_ms = report.elapsed_ms, "Research finished");

    println!("{}", formatter.format_report(&report)?);

    if let Some(path) = args.output {
        write_json(&path, &report)?;
        eprintln!(
            "{}",
            formatter.success(&format!("Report written to {}", path.display()))
        );
    }

    Ok(())
}
