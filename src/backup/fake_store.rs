// In-memory StorageClient used by the pipeline tests.
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::storage::{ObjectMetadata, RemoteObject, StorageClient};
use crate::errors::StoreError;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub etag: String,
    pub metadata: Option<ObjectMetadata>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, StoredObject>,
    fail_upload: HashSet<String>,
    fail_exists: HashSet<String>,
    fail_head: HashSet<String>,
    corrupt_upload: HashSet<String>,
    panic_upload: HashSet<String>,
    calls: Vec<String>,
}

/// Objects larger than `multipart_threshold` get a composite ETag, like a
/// real multipart transfer would.
pub struct FakeStore {
    multipart_threshold: u64,
    upload_delay: Option<Duration>,
    uploads_in_flight: AtomicUsize,
    peak_uploads_in_flight: AtomicUsize,
    inner: Mutex<Inner>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::with_multipart_threshold(u64::MAX)
    }

    pub fn with_multipart_threshold(multipart_threshold: u64) -> Self {
        FakeStore {
            multipart_threshold,
            upload_delay: None,
            uploads_in_flight: AtomicUsize::new(0),
            peak_uploads_in_flight: AtomicUsize::new(0),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Every upload holds its slot for `delay` before storing anything.
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    /// Highest number of uploads observed running at the same time.
    pub fn peak_uploads_in_flight(&self) -> usize {
        self.peak_uploads_in_flight.load(Ordering::SeqCst)
    }

    pub fn insert(&self, key: &str, data: Vec<u8>) {
        let etag = format!("{:x}", md5::compute(&data));
        self.insert_with_etag(key, data, &etag);
    }

    pub fn insert_with_etag(&self, key: &str, data: Vec<u8>, etag: &str) {
        self.lock().objects.insert(
            key.to_string(),
            StoredObject {
                data,
                etag: etag.to_string(),
                metadata: None,
            },
        );
    }

    pub fn fail_upload_for(&self, key: &str) {
        self.lock().fail_upload.insert(key.to_string());
    }

    pub fn fail_exists_for(&self, key: &str) {
        self.lock().fail_exists.insert(key.to_string());
    }

    pub fn fail_head_for(&self, key: &str) {
        self.lock().fail_head.insert(key.to_string());
    }

    /// The next upload of `key` stores the content with its first byte flipped.
    pub fn corrupt_upload_for(&self, key: &str) {
        self.lock().corrupt_upload.insert(key.to_string());
    }

    pub fn panic_on_upload_for(&self, key: &str) {
        self.lock().panic_upload.insert(key.to_string());
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Calls in the form `"<operation> <key>"`, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, operation: &str) -> usize {
        let prefix = format!("{} ", operation);
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StorageClient for FakeStore {
    async fn exists(&self, key: &str) -> Result<(bool, Option<String>), StoreError> {
        let mut inner = self.lock();
        inner.calls.push(format!("exists {}", key));
        if inner.fail_exists.contains(key) {
            return Err(StoreError::request("head_object", key, "simulated outage"));
        }
        Ok(match inner.objects.get(key) {
            Some(object) => (true, Some(object.etag.clone())),
            None => (false, None),
        })
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|source| StoreError::LocalRead {
                path: local_path.to_path_buf(),
                source,
            })?;

        if let Some(delay) = self.upload_delay {
            let running = self.uploads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_uploads_in_flight.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        let mut inner = self.lock();
        inner.calls.push(format!("upload {}", key));
        if inner.panic_upload.contains(key) {
            drop(inner);
            panic!("simulated worker fault for {}", key);
        }
        if inner.fail_upload.contains(key) {
            return Err(StoreError::request("put_object", key, "simulated transfer failure"));
        }

        let multipart = data.len() as u64 > self.multipart_threshold;
        let mut stored = data;
        if inner.corrupt_upload.remove(key) {
            if let Some(first) = stored.first_mut() {
                *first ^= 0xff;
            }
        }
        let digest = format!("{:x}", md5::compute(&stored));
        let etag = if multipart { format!("{}-2", digest) } else { digest };

        inner.objects.insert(
            key.to_string(),
            StoredObject {
                data: stored,
                etag,
                metadata: Some(metadata.clone()),
            },
        );
        Ok(())
    }

    async fn head_metadata(&self, key: &str) -> Result<RemoteObject, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(format!("head {}", key));
        if inner.fail_head.contains(key) {
            return Err(StoreError::request("head_object", key, "simulated outage"));
        }
        inner
            .objects
            .get(key)
            .map(|object| RemoteObject {
                etag: object.etag.clone(),
                content_length: object.data.len() as u64,
            })
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.push(format!("delete {}", key));
        inner.objects.remove(key);
        Ok(())
    }
}
