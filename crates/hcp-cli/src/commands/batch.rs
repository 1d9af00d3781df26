//! Batch command implementation.

use super::{build_pipeline, write_json};
use crate::cli::BatchArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::input::{read_names, NAME_COLUMN};
use crate::output::Formatter;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Execute the batch command.
///
/// A failed entity never stops the batch; Ctrl-C does, and the entities
/// finished so far are still printed and written.
pub async fn execute_batch(
    args: BatchArgs,
    config: &Config,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> Result<()> {
    let names = read_names(&args.file)?;
    if names.is_empty() {
        return Err(CliError::InvalidInput(format!(
            "No names found in the '{}' column of {}",
            NAME_COLUMN,
            args.file.display()
        )));
    }
    info!(count = names.len(), file = %args.file.display(), "Starting batch");

    let pipeline = build_pipeline(config, &args.keys)?;
    let outcomes = pipeline.research_batch(&names, cancel).await;

    println!("{}", formatter.format_batch(&outcomes)?);

    if let Some(path) = args.output {
        write_json(&path, &outcomes)?;
        eprintln!(
            "{}",
            formatter.success(&format!(
                "{} result(s) written to {}",
                outcomes.len(),
                path.display()
            ))
        );
    }

    if cancel.is_cancelled() {
        eprintln!(
            "{}",
            formatter.warning(&format!(
                "Batch interrupted after {} of {} entities",
                outcomes.len(),
                names.len()
            ))
        );
    }

    Ok(())
}
