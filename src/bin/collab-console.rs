//! Collab Console CLI Binary
//!
//! Command-line front end for resolving context, following pipeline runs and
//! browsing audit logs on a collaboration server.

use anyhow::{anyhow, Context};
use clap::Parser;
use collab_console::cli::{map_error, Cli, RunContext};
use collab_console::config::ConsoleConfig;
use collab_console::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RunContext::load_config(&cli).map_err(|e| anyhow!(map_error(&e)))?;

    let logging_config = build_logging_config(&cli, &config);
    init_logging(Some(&logging_config)).context("Failed to initialize logging")?;
    info!("Collab console starting");

    let context = RunContext::new(config).map_err(|e| anyhow!(map_error(&e)))?;

    let mut stdout = std::io::stdout().lock();
    match context.execute(&cli.command, &mut stdout).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(anyhow!(map_error(&e)))
        }
    }
}

/// Build logging configuration from the loaded config and CLI flags.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli, config: &ConsoleConfig) -> LoggingConfig {
    let mut logging = config.logging.clone();

    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        logging.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        logging.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        logging.output = output.clone();
    }

    logging
}
