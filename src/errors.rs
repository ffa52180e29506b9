use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backup directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Verification failed: {0}")]
    VerificationMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// Failures reported by a `StorageClient`. "Object absent" during an
/// existence check is not an error and never shows up here.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object {key} not found in the bucket")]
    NotFound { key: String },

    #[error("{operation} failed for key {key}: {message}")]
    Request {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("Failed to read {} for transfer: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn request(operation: &'static str, key: &str, message: impl Into<String>) -> Self {
        StoreError::Request {
            operation,
            key: key.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
