// s3backuptool/src/backup/stats.rs
use log::info;
use std::time::Duration;

use super::worker::UploadOutcome;
use crate::utils::format_megabytes;

/// Aggregate of one run. Owned by the runner and updated only as worker
/// results arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub uploaded: u64,
    pub skipped: u64,
    /// Dry run only: files that would have been uploaded.
    pub planned: u64,
    pub failed: u64,
    pub deleted: u64,
    pub total_bytes: u64,
}

impl RunStatistics {
    pub fn record(&mut self, outcome: &UploadOutcome) {
        if outcome.is_failure() {
            self.failed += 1;
            return;
        }
        match outcome {
            UploadOutcome::Uploaded { bytes, deleted } => {
                self.uploaded += 1;
                self.total_bytes += bytes;
                if *deleted {
                    self.deleted += 1;
                }
            }
            UploadOutcome::SkippedExisting => self.skipped += 1,
            UploadOutcome::WouldUpload { .. } => self.planned += 1,
            UploadOutcome::VerificationFailed | UploadOutcome::TransferFailed(_) => {}
        }
    }

    /// A worker that died without producing an outcome.
    pub fn record_fault(&mut self) {
        self.failed += 1;
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn log_summary(&self, elapsed: Duration) {
        info!("{}", "=".repeat(80));
        info!("Run statistics:");
        info!("  Uploaded:     {}", self.uploaded);
        info!("  Skipped:      {}", self.skipped);
        if self.planned > 0 {
            info!("  Would upload: {}", self.planned);
        }
        info!("  Failed:       {}", self.failed);
        info!("  Deleted:      {}", self.deleted);
        info!("  Transferred:  {}", format_megabytes(self.total_bytes));
        info!("  Elapsed:      {:.1}s", elapsed.as_secs_f64());
        info!("{}", "=".repeat(80));
    }
}
