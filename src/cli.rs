use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/backup/s3-config.json";

/// Uploads local backup archives to an S3-compatible object store.
#[derive(Parser, Debug)]
#[clap(name = "s3backuptool", about = "Upload backup archives to S3-compatible storage")]
pub struct Args {
    /// Path to the JSON configuration file
    #[clap(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Simulate the run: check what exists remotely, upload and delete nothing
    #[clap(long)]
    pub dry_run: bool,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Also append log lines to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,
}
