//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::{Config, OutputFormat};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::path::{Path, PathBuf};

/// Execute the config command.
pub fn execute_config(
    args: ConfigArgs,
    path: Option<&Path>,
    format: OutputFormat,
    formatter: &Formatter,
) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };

    match args.action {
        ConfigAction::Show => {
            let config = Config::load(Some(path.as_path()))?;
            if !path.exists() {
                eprintln!(
                    "{}",
                    formatter.info(&format!("{} not found, showing defaults", path.display()))
                );
            }
            println!("{}", render(&config, format)?);
        }
        ConfigAction::Init { force } => {
            let written = init(&path, force)?;
            println!(
                "{}",
                formatter.success(&format!("Configuration written to {}", written.display()))
            );
        }
    }

    Ok(())
}

/// Write the default configuration to `path`.
pub fn init(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        return Err(CliError::InvalidInput(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }
    Config::default().save(path)?;
    Ok(path.to_path_buf())
}

fn render(config: &Config, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(config)?),
        OutputFormat::Table => config.to_toml(),
    }
}
