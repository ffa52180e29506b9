mod logic;
pub(crate) mod s3_upload;
pub(crate) mod selector;
pub(crate) mod stats;
pub(crate) mod storage;
pub(crate) mod verification;
pub(crate) mod worker;

#[cfg(test)]
pub(crate) mod fake_store;

use std::sync::Arc;

use crate::config::RunConfiguration;
use logic::BackupRunner;
use s3_upload::S3Store;
use stats::RunStatistics;

/// Public entry point for one upload pass against the configured bucket.
pub async fn run_backup_flow(config: RunConfiguration, dry_run: bool) -> RunStatistics {
    let config = Arc::new(config);
    let store = Arc::new(S3Store::connect(&config).await);
    BackupRunner::new(config, store).run(dry_run).await
}
