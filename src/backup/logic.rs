// s3backuptool/src/backup/logic.rs
use futures::stream::{self, StreamExt};
use log::{error, info};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use super::selector::select_candidates;
use super::stats::RunStatistics;
use super::storage::StorageClient;
use super::worker::UploadWorker;
use crate::config::RunConfiguration;
use crate::errors::AppError;
use crate::utils::format_megabytes;

/// Drives a full pass: select candidates, fan them out over a bounded pool
/// of workers sharing one storage client, fold the outcomes.
pub struct BackupRunner {
    config: Arc<RunConfiguration>,
    client: Arc<dyn StorageClient>,
}

impl BackupRunner {
    pub fn new(config: Arc<RunConfiguration>, client: Arc<dyn StorageClient>) -> Self {
        BackupRunner { config, client }
    }

    pub async fn run(&self, dry_run: bool) -> RunStatistics {
        let started = Instant::now();
        let backup = &self.config.backup;
        let store = &self.config.store;

        info!("{}", "=".repeat(80));
        info!("Starting backup upload to object storage");
        if dry_run {
            info!("DRY-RUN mode: nothing will be uploaded or deleted");
        }
        info!("Endpoint: {}", store.endpoint_url);
        info!("Bucket: {}", store.bucket_name);
        info!("{}", "=".repeat(80));

        let mut stats = RunStatistics::default();

        let candidates = match select_candidates(
            &backup.backup_dir,
            &backup.extensions,
            backup.day_delta,
            SystemTime::now(),
        ) {
            Ok(candidates) => candidates,
            Err(e @ AppError::DirectoryNotFound(_)) => {
                error!("{}", e);
                Vec::new()
            }
            Err(e) => {
                error!("Failed to scan {}: {}", backup.backup_dir.display(), e);
                stats.record_fault();
                Vec::new()
            }
        };

        if candidates.is_empty() {
            info!("No files to upload");
            stats.log_summary(started.elapsed());
            return stats;
        }

        let total_size: u64 = candidates.iter().map(|c| c.size).sum();
        info!("Found {} file(s) to upload", candidates.len());
        info!("Total size: {}", format_megabytes(total_size));

        let worker = UploadWorker::new(
            self.client.clone(),
            &store.storage_class,
            backup.delete_after_upload,
            dry_run,
        );

        // Tasks are spawned lazily, so at most `max_workers` run at once.
        let mut results = stream::iter(candidates)
            .map(|candidate| {
                let worker = worker.clone();
                let path = candidate.path.clone();
                let handle = tokio::spawn(async move { worker.process(&candidate).await });
                async move { (path, handle.await) }
            })
            .buffer_unordered(backup.max_workers);

        while let Some((path, joined)) = results.next().await {
            match joined {
                Ok(outcome) => stats.record(&outcome),
                Err(e) => {
                    error!("Critical error while processing {}: {}", path.display(), e);
                    stats.record_fault();
                }
            }
        }

        stats.log_summary(started.elapsed());
        stats
    }
}
