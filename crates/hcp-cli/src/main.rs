//! hcp - research UAE hospitals and clinics from the command line.

use anyhow::Context;
use clap::Parser;
use hcp_cli::cli::CliFormat;
use hcp_cli::commands;
use hcp_cli::config::OutputFormat;
use hcp_cli::{Cli, Command, Config, Formatter};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let Cli {
        format,
        no_color,
        config: config_path,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);

    match command {
        // Config commands work even when the file on disk is broken
        Command::Config(args) => {
            let format = format.map(Into::into).unwrap_or(OutputFormat::Table);
            let formatter = Formatter::new(format, !no_color);
            commands::execute_config(args, config_path.as_deref(), format, &formatter)?;
        }
        Command::Research(args) => {
            let session = Session::start(format, no_color, config_path.as_deref())?;
            commands::execute_research(args, &session.config, &session.formatter, &session.cancel)
                .await?;
        }
        Command::Batch(args) => {
            let session = Session::start(format, no_color, config_path.as_deref())?;
            commands::execute_batch(args, &session.config, &session.formatter, &session.cancel)
                .await?;
        }
    }

    Ok(())
}

/// Loaded configuration plus the Ctrl-C cancellation token
struct Session {
    config: Config,
    formatter: Formatter,
    cancel: CancellationToken,
}

impl Session {
    fn start(
        format: Option<CliFormat>,
        no_color: bool,
        config_path: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let config = Config::load(config_path).context("Failed to load configuration")?;

        let format = format.map(Into::into).unwrap_or(config.settings.format);
        let color_enabled = !no_color && config.settings.color;
        let formatter = Formatter::new(format, color_enabled);

        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling research");
                    cancel.cancel();
                }
            }
        });

        Ok(Self {
            config,
            formatter,
            cancel,
        })
    }
}

/// Log to stderr so stdout carries only the report. `-v` forces debug;
/// otherwise `RUST_LOG` applies, defaulting to info.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
