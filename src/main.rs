//! Backup Upload Tool
//!
//! Uploads local backup archives to an S3-compatible object store, at most
//! once per file, verified, optionally removing the local copy afterwards.

// s3backuptool/src/main.rs
mod backup;
mod cli;
mod config;
mod errors;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, error, info};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;

use cli::Args;
use config::RunConfiguration;

/// Main entry point for the upload tool
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = initialize_logging(args.verbose, args.log_file.as_deref()) {
        eprintln!("❌ Error: {:?}", e);
        return ExitCode::FAILURE;
    }

    match run_app(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("Run finished with failures");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Critical error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(args: &Args) -> Result<bool> {
    let config = RunConfiguration::load_from_json(&args.config).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.config.display()
        )
    })?;
    info!("Configuration loaded from {}", args.config.display());

    let stats = backup::run_backup_flow(config, args.dry_run).await;
    Ok(stats.is_success())
}

/// Terminal output always; a log file as well when one is given.
fn initialize_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        loggers.push(WriteLogger::new(log_level, Config::default(), file));
    }

    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}
