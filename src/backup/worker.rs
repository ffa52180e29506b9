// s3backuptool/src/backup/worker.rs
use chrono::Local;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;

use super::selector::CandidateFile;
use super::storage::{ObjectMetadata, StorageClient};
use super::verification::verify_upload;
use crate::utils::format_megabytes;

/// Terminal classification of one file's pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Transferred and verified. `deleted` is true when the local copy was removed.
    Uploaded { bytes: u64, deleted: bool },
    /// An object with the same key is already in the bucket.
    SkippedExisting,
    /// Dry run: the file would have been uploaded.
    WouldUpload { bytes: u64 },
    /// The transfer reported success but the stored object did not match.
    VerificationFailed,
    TransferFailed(String),
}

impl UploadOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UploadOutcome::VerificationFailed | UploadOutcome::TransferFailed(_)
        )
    }
}

/// Objects are keyed by the file's base name.
pub fn object_key(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

/// Runs one candidate through exists → upload → verify → local delete.
/// Cheap to clone; every clone shares the same storage client.
#[derive(Clone)]
pub struct UploadWorker {
    client: Arc<dyn StorageClient>,
    storage_class: String,
    delete_after_upload: bool,
    dry_run: bool,
}

impl UploadWorker {
    pub fn new(
        client: Arc<dyn StorageClient>,
        storage_class: impl Into<String>,
        delete_after_upload: bool,
        dry_run: bool,
    ) -> Self {
        UploadWorker {
            client,
            storage_class: storage_class.into(),
            delete_after_upload,
            dry_run,
        }
    }

    /// Never fails: every path ends in an `UploadOutcome`.
    pub async fn process(&self, candidate: &CandidateFile) -> UploadOutcome {
        let Some(key) = object_key(&candidate.path) else {
            error!(
                "Cannot derive an object key from {}: file name is not valid UTF-8",
                candidate.path.display()
            );
            return UploadOutcome::TransferFailed("file name is not valid UTF-8".to_string());
        };

        match self.client.exists(&key).await {
            Ok((true, etag)) => {
                info!(
                    "Skipped {}: already exists in the bucket (etag {})",
                    key,
                    etag.as_deref().unwrap_or("unknown")
                );
                return UploadOutcome::SkippedExisting;
            }
            Ok((false, _)) => {}
            Err(e) => {
                error!("Failed to check whether {} exists: {}", key, e);
                return UploadOutcome::TransferFailed(e.to_string());
            }
        }

        if self.dry_run {
            info!(
                "[DRY-RUN] Would upload {} ({})",
                key,
                format_megabytes(candidate.size)
            );
            return UploadOutcome::WouldUpload {
                bytes: candidate.size,
            };
        }

        info!("Uploading {} ({})...", key, format_megabytes(candidate.size));
        let metadata = ObjectMetadata {
            original_path: candidate.path.display().to_string(),
            upload_date: Local::now(),
            storage_class: self.storage_class.clone(),
        };
        if let Err(e) = self.client.upload(&candidate.path, &key, &metadata).await {
            error!("Transfer of {} failed: {}", key, e);
            return UploadOutcome::TransferFailed(e.to_string());
        }

        if let Err(e) = verify_upload(self.client.as_ref(), &candidate.path, &key).await {
            error!("Verification of {} failed: {}; removing the remote object", key, e);
            if let Err(e) = self.client.delete(&key).await {
                warn!("Failed to remove corrupted object {}: {}", key, e);
            }
            return UploadOutcome::VerificationFailed;
        }

        info!("✓ Uploaded {}", key);
        let deleted = self.delete_after_upload && remove_local_file(&candidate.path).await;
        UploadOutcome::Uploaded {
            bytes: candidate.size,
            deleted,
        }
    }
}

async fn remove_local_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!("Deleted local file: {}", path.display());
            true
        }
        Err(e) => {
            error!(
                "Uploaded copy is safe but the local file {} could not be deleted: {}",
                path.display(),
                e
            );
            false
        }
    }
}
