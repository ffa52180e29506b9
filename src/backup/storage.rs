// s3backuptool/src/backup/storage.rs
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::Path;

use crate::errors::StoreError;

/// What the object store reports about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// ETag with surrounding quotes already stripped.
    pub etag: String,
    pub content_length: u64,
}

/// Metadata attached to every uploaded object. Opaque to the pipeline,
/// passed straight through to the store.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub original_path: String,
    pub upload_date: DateTime<Local>,
    pub storage_class: String,
}

/// The object store as seen by the upload pipeline. One instance is shared
/// by every worker of a run, so implementations must be safe for concurrent
/// use.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Returns `(true, etag)` when `key` is present, `(false, None)` when the
    /// store answers "not found". Any other failure is an error.
    async fn exists(&self, key: &str) -> Result<(bool, Option<String>), StoreError>;

    /// Transfers `local_path` to `key`. Whether a single request or a chunked
    /// (multipart) transfer is used is the client's decision.
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError>;

    /// Fails with `StoreError::NotFound` when the object is absent.
    async fn head_metadata(&self, key: &str) -> Result<RemoteObject, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
