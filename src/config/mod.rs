// s3backuptool/src/config/mod.rs
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::errors::{AppError, Result};
use crate::utils::setting::MIN_MULTIPART_THRESHOLD;

// Defaults applied when a field is absent from the configuration file.
pub const DEFAULT_DAY_DELTA: u32 = 3;
pub const DEFAULT_DELETE_AFTER_UPLOAD: bool = true;
pub const DEFAULT_MAX_WORKERS: usize = 3;
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REGION: &str = "ru-1";
pub const DEFAULT_VERIFY_SSL: bool = true;
pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";
pub const DEFAULT_FORCE_PATH_STYLE: bool = false;

// Structs for deserializing the JSON configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonExtensions {
    /// `[".7z", ".gz", ".zip"]`
    List(Vec<String>),
    /// `".7z, .gz, .zip"`
    Joined(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonBackupSection {
    pub directory: Option<PathBuf>,
    pub extensions: Option<JsonExtensions>,
    pub day_delta: Option<u32>,
    pub delete_after_upload: Option<bool>,
    pub max_workers: Option<usize>,
    pub multipart_threshold: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Clone, Deserialize)]
pub struct JsonS3Section {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub verify_ssl: Option<bool>,
    pub storage_class: Option<String>,
    pub force_path_style: Option<bool>,
}

#[derive(Clone, Deserialize)]
pub struct RawJsonConfig {
    pub backup: Option<JsonBackupSection>,
    pub s3: Option<JsonS3Section>,
}

// Application's internal configuration structs

/// Local side of a run: what to pick up and how to process it.
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub backup_dir: PathBuf,
    /// Accepted extensions without the leading dot, compared case-sensitively.
    pub extensions: BTreeSet<String>,
    pub day_delta: u32,
    pub delete_after_upload: bool,
    pub max_workers: usize,
    pub multipart_threshold: u64,
    pub max_retries: u32,
}

/// Connection parameters for the S3-compatible object store.
#[derive(Clone)]
pub struct StoreSettings {
    pub endpoint_url: String,
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub verify_ssl: bool,
    pub storage_class: String,
    pub force_path_style: bool,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("endpoint_url", &self.endpoint_url)
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("storage_class", &self.storage_class)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

/// Immutable settings for a single run, validated once at load time.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub backup: BackupSettings,
    pub store: StoreSettings,
}

impl RunConfiguration {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        if !config_path.is_file() {
            return Err(AppError::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
        let config_content = fs::read_to_string(config_path)?;
        Self::from_json_str(&config_content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw_json_config: RawJsonConfig = serde_json::from_str(content)?;
        Self::from_raw(raw_json_config)
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let backup_raw = raw
            .backup
            .ok_or_else(|| AppError::Config("the \"backup\" section is missing".to_string()))?;
        let s3_raw = raw
            .s3
            .ok_or_else(|| AppError::Config("the \"s3\" section is missing".to_string()))?;

        Ok(RunConfiguration {
            backup: load_backup_settings(backup_raw)?,
            store: load_store_settings(s3_raw)?,
        })
    }
}

fn load_backup_settings(raw: JsonBackupSection) -> Result<BackupSettings> {
    let backup_dir = raw
        .directory
        .filter(|dir| !dir.as_os_str().is_empty())
        .ok_or_else(|| AppError::Config("backup.directory must be set".to_string()))?;

    let extensions = parse_extensions(
        raw.extensions
            .ok_or_else(|| AppError::Config("backup.extensions must be set".to_string()))?,
    )?;

    let max_workers = raw.max_workers.unwrap_or(DEFAULT_MAX_WORKERS);
    if max_workers == 0 {
        return Err(AppError::Config(
            "backup.max_workers must be at least 1".to_string(),
        ));
    }

    let max_retries = raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
    if max_retries == 0 {
        return Err(AppError::Config(
            "backup.max_retries must be at least 1 (it counts the first attempt)".to_string(),
        ));
    }

    let multipart_threshold = raw
        .multipart_threshold
        .unwrap_or(DEFAULT_MULTIPART_THRESHOLD);
    if multipart_threshold < MIN_MULTIPART_THRESHOLD {
        return Err(AppError::Config(format!(
            "backup.multipart_threshold must be at least {} bytes, got {}",
            MIN_MULTIPART_THRESHOLD, multipart_threshold
        )));
    }

    Ok(BackupSettings {
        backup_dir,
        extensions,
        day_delta: raw.day_delta.unwrap_or(DEFAULT_DAY_DELTA),
        delete_after_upload: raw
            .delete_after_upload
            .unwrap_or(DEFAULT_DELETE_AFTER_UPLOAD),
        max_workers,
        multipart_threshold,
        max_retries,
    })
}

fn load_store_settings(raw: JsonS3Section) -> Result<StoreSettings> {
    let endpoint_url = required(raw.endpoint, "s3.endpoint")?;
    let parsed = Url::parse(&endpoint_url).map_err(|e| {
        AppError::Config(format!("s3.endpoint is not a valid URL ({}): {}", endpoint_url, e))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AppError::Config(format!(
            "s3.endpoint must use http or https, got {}",
            parsed.scheme()
        )));
    }

    Ok(StoreSettings {
        endpoint_url,
        bucket_name: required(raw.bucket, "s3.bucket")?,
        region: raw
            .region
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        access_key_id: required(raw.access_key, "s3.access_key")?,
        secret_access_key: required(raw.secret_key, "s3.secret_key")?,
        verify_ssl: raw.verify_ssl.unwrap_or(DEFAULT_VERIFY_SSL),
        storage_class: raw
            .storage_class
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_string()),
        force_path_style: raw.force_path_style.unwrap_or(DEFAULT_FORCE_PATH_STYLE),
    })
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("{} must be set and non-empty", field)))
}

/// Parses the extensions setting, either an array or a comma separated string.
/// The leading dot is optional; entries are stored without it.
fn parse_extensions(raw: JsonExtensions) -> Result<BTreeSet<String>> {
    let entries: Vec<String> = match raw {
        JsonExtensions::List(list) => list,
        JsonExtensions::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };

    let extensions: BTreeSet<String> = entries
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_string())
        .filter(|e| !e.is_empty())
        .collect();

    if extensions.is_empty() {
        return Err(AppError::Config(
            "backup.extensions must list at least one extension".to_string(),
        ));
    }
    Ok(extensions)
}
