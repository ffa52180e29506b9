// s3backuptool/src/backup/s3_upload.rs
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_s3 as s3;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use s3::types::{CompletedMultipartUpload, CompletedPart, StorageClass};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::storage::{ObjectMetadata, RemoteObject, StorageClient};
use crate::config::RunConfiguration;
use crate::errors::StoreError;
use crate::utils::setting::{
    MAX_MULTIPART_PARTS, META_ORIGINAL_PATH, META_UPLOAD_DATE, MULTIPART_CONCURRENCY,
    MULTIPART_PART_SIZE,
};
use crate::utils::strip_etag_quotes;

/// `StorageClient` backed by an S3-compatible object storage service.
///
/// Transport retries are delegated to the SDK's adaptive retry policy; the
/// pipeline never loops on its own.
pub struct S3Store {
    client: s3::Client,
    bucket: String,
    multipart_threshold: u64,
}

impl S3Store {
    pub async fn connect(config: &RunConfiguration) -> Self {
        let store = &config.store;

        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest());
        if !store.verify_ssl {
            warn!(
                "TLS certificate verification is disabled for {}",
                store.endpoint_url
            );
            loader = loader.http_client(insecure_http_client());
        }

        let sdk_config = loader
            .endpoint_url(&store.endpoint_url)
            .region(Region::new(store.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &store.access_key_id,
                &store.secret_access_key,
                None, // session_token
                None, // expiry
                "Static", // provider_name
            ))
            .retry_config(RetryConfig::adaptive().with_max_attempts(config.backup.max_retries))
            .load()
            .await;

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(store.force_path_style)
            .build();

        debug!(
            "S3 client ready: endpoint {}, region {}, bucket {}",
            store.endpoint_url, store.region, store.bucket_name
        );

        S3Store {
            client: s3::Client::from_conf(s3_config),
            bucket: store.bucket_name.clone(),
            multipart_threshold: config.backup.multipart_threshold,
        }
    }

    async fn put_single(
        &self,
        local_path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StoreError::LocalRead {
                path: local_path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .storage_class(StorageClass::from(metadata.storage_class.as_str()))
            .metadata(META_ORIGINAL_PATH, &metadata.original_path)
            .metadata(META_UPLOAD_DATE, metadata.upload_date.to_rfc3339())
            .send()
            .await
            .map_err(|e| StoreError::request("put_object", key, DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        local_path: &Path,
        key: &str,
        size: u64,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .storage_class(StorageClass::from(metadata.storage_class.as_str()))
            .metadata(META_ORIGINAL_PATH, &metadata.original_path)
            .metadata(META_UPLOAD_DATE, metadata.upload_date.to_rfc3339())
            .send()
            .await
            .map_err(|e| {
                StoreError::request("create_multipart_upload", key, DisplayErrorContext(&e).to_string())
            })?;
        let upload_id = create
            .upload_id()
            .ok_or_else(|| StoreError::request("create_multipart_upload", key, "no upload id returned"))?
            .to_string();

        match self.upload_parts(local_path, key, &upload_id, size).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| {
                        StoreError::request(
                            "complete_multipart_upload",
                            key,
                            DisplayErrorContext(&e).to_string(),
                        )
                    })?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id,
                        key,
                        DisplayErrorContext(&abort_err)
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        local_path: &Path,
        key: &str,
        upload_id: &str,
        size: u64,
    ) -> Result<Vec<CompletedPart>, StoreError> {
        let part_size = part_size_for(size);
        let part_count = size.div_ceil(part_size);
        debug!("Uploading {} in {} parts of {} bytes", key, part_count, part_size);

        let mut parts: Vec<CompletedPart> = stream::iter(0..part_count)
            .map(|index| {
                let offset = index * part_size;
                let length = part_size.min(size - offset);
                self.upload_part(local_path, key, upload_id, (index + 1) as i32, offset, length)
            })
            .buffer_unordered(MULTIPART_CONCURRENCY)
            .try_collect()
            .await?;

        parts.sort_by_key(|part| part.part_number());
        Ok(parts)
    }

    async fn upload_part(
        &self,
        local_path: &Path,
        key: &str,
        upload_id: &str,
        part_number: i32,
        offset: u64,
        length: u64,
    ) -> Result<CompletedPart, StoreError> {
        let data = read_range(local_path, offset, length)
            .await
            .map_err(|source| StoreError::LocalRead {
                path: local_path.to_path_buf(),
                source,
            })?;

        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::request("upload_part", key, DisplayErrorContext(&e).to_string()))?;

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(response.e_tag().map(str::to_string))
            .build())
    }
}

#[async_trait]
impl StorageClient for S3Store {
    async fn exists(&self, key: &str) -> Result<(bool, Option<String>), StoreError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(head) => Ok((true, head.e_tag().map(strip_etag_quotes))),
            Err(e) => {
                if e.as_service_error().is_some_and(|err| err.is_not_found()) {
                    Ok((false, None))
                } else {
                    Err(StoreError::request("head_object", key, DisplayErrorContext(&e).to_string()))
                }
            }
        }
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|source| StoreError::LocalRead {
                path: local_path.to_path_buf(),
                source,
            })?
            .len();

        if size > self.multipart_threshold {
            info!("{} exceeds the multipart threshold, uploading in parts", key);
            self.put_multipart(local_path, key, size, metadata).await
        } else {
            self.put_single(local_path, key, metadata).await
        }
    }

    async fn head_metadata(&self, key: &str) -> Result<RemoteObject, StoreError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(head) => Ok(RemoteObject {
                etag: head.e_tag().map(strip_etag_quotes).unwrap_or_default(),
                content_length: head.content_length().unwrap_or_default().max(0) as u64,
            }),
            Err(e) => {
                if e.as_service_error().is_some_and(|err| err.is_not_found()) {
                    Err(StoreError::NotFound {
                        key: key.to_string(),
                    })
                } else {
                    Err(StoreError::request("head_object", key, DisplayErrorContext(&e).to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::request("delete_object", key, DisplayErrorContext(&e).to_string()))?;
        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

/// Accepts any server certificate. Only installed when `verify_ssl` is off.
struct SkipServerVerification;

impl rustls::client::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

/// HTTP client for endpoints with self-signed or otherwise untrusted
/// certificates. Plain `http://` endpoints keep working through it.
fn insecure_http_client() -> s3::config::SharedHttpClient {
    use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;

    let mut tls = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(rustls::RootCertStore::empty())
        .with_no_client_auth();
    tls.dangerous()
        .set_certificate_verifier(Arc::new(SkipServerVerification));

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    HyperClientBuilder::new().build(https_connector)
}

/// Part size for an object of `size` bytes: the preferred size, grown when
/// needed to stay within the part count limit.
pub fn part_size_for(size: u64) -> u64 {
    MULTIPART_PART_SIZE.max(size.div_ceil(MAX_MULTIPART_PARTS))
}

async fn read_range(path: &Path, offset: u64, length: u64) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buffer = vec![0u8; length as usize];
    file.read_exact(&mut buffer).await?;
    Ok(buffer)
}
