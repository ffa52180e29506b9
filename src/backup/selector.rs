// s3backuptool/src/backup/selector.rs
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

use crate::errors::{AppError, Result};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub size: u64,
    pub created: SystemTime,
}

/// Lists the regular files directly inside `backup_dir` whose extension is
/// accepted and whose creation time falls within the last `day_delta` days,
/// oldest first.
///
/// Subdirectories are not descended into. Filesystems that do not record a
/// birth time fall back to the modification time.
pub fn select_candidates(
    backup_dir: &Path,
    extensions: &BTreeSet<String>,
    day_delta: u32,
    now: SystemTime,
) -> Result<Vec<CandidateFile>> {
    if !backup_dir.is_dir() {
        return Err(AppError::DirectoryNotFound(backup_dir.to_path_buf()));
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(backup_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry.map_err(|e| {
            AppError::Io(std::io::Error::other(format!(
                "Failed to read directory {}: {}",
                backup_dir.display(),
                e
            )))
        })?;
        if !entry.file_type().is_file() || !has_accepted_extension(entry.path(), extensions) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| {
            AppError::Io(std::io::Error::other(format!(
                "Failed to stat {}: {}",
                entry.path().display(),
                e
            )))
        })?;
        let created = metadata.created().or_else(|_| metadata.modified())?;

        if is_within_window(created, now, day_delta) {
            candidates.push(CandidateFile {
                path: entry.into_path(),
                size: metadata.len(),
                created,
            });
        }
    }

    candidates.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));
    Ok(candidates)
}

/// Case-sensitive match of the last extension against the accepted set
/// (stored without the leading dot).
pub fn has_accepted_extension(path: &Path, extensions: &BTreeSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(ext))
}

/// `created` must lie within `[now - day_delta days, now]`; the lower edge is inclusive.
pub fn is_within_window(created: SystemTime, now: SystemTime, day_delta: u32) -> bool {
    let window = Duration::from_secs(u64::from(day_delta) * SECONDS_PER_DAY);
    let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);
    created >= cutoff && created <= now
}
