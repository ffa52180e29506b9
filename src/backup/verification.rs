// s3backuptool/src/backup/verification.rs
use log::info;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use super::storage::StorageClient;
use crate::errors::{AppError, Result};
use crate::utils::setting::HASH_CHUNK_SIZE;
use crate::utils::strip_etag_quotes;

/// Multipart uploads produce `<hex>-<part count>` ETags, which are not a
/// digest of the object content.
pub fn is_composite_etag(etag: &str) -> bool {
    etag.contains('-')
}

/// Hex MD5 of a local file, streamed in fixed-size chunks.
pub fn file_md5(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut context = md5::Context::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", context.compute()))
}

async fn file_md5_blocking(path: &Path) -> io::Result<String> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_md5(&owned))
        .await
        .map_err(io::Error::other)?
}

/// Confirms that the object stored under `key` matches `local_path`.
///
/// For a plain ETag the local MD5 must equal it exactly. A composite
/// (multipart) ETag carries no content digest, so only the sizes are
/// compared; same-size corruption goes unnoticed on that path.
///
/// A mismatch is reported as `AppError::VerificationMismatch`; any other
/// error means the remote metadata or the local file could not be read.
pub async fn verify_upload(
    client: &dyn StorageClient,
    local_path: &Path,
    key: &str,
) -> Result<()> {
    let remote = client.head_metadata(key).await?;
    let remote_etag = strip_etag_quotes(&remote.etag);

    if is_composite_etag(&remote_etag) {
        let local_size = tokio::fs::metadata(local_path).await?.len();
        if local_size != remote.content_length {
            return Err(AppError::VerificationMismatch(format!(
                "size of {} differs: local {} bytes, remote {} bytes",
                key, local_size, remote.content_length
            )));
        }
        info!("Verified {}: sizes match ({} bytes, multipart ETag)", key, local_size);
        return Ok(());
    }

    let local_md5 = file_md5_blocking(local_path).await.map_err(AppError::Io)?;
    if local_md5 != remote_etag {
        return Err(AppError::VerificationMismatch(format!(
            "MD5 of {} differs: local {}, remote {}",
            key, local_md5, remote_etag
        )));
    }
    info!("Verified {}: MD5 matches", key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::fake_store::FakeStore;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_md5_known_value() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("hello.gz");
        fs::write(&path, b"hello")?;
        assert_eq!(file_md5(&path)?, "5d41402abc4b2a76b9719d911017c592");
        Ok(())
    }

    #[test]
    fn test_file_md5_spans_multiple_chunks() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("big.gz");
        let data: Vec<u8> = (0..HASH_CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data)?;
        assert_eq!(file_md5(&path)?, format!("{:x}", md5::compute(&data)));
        Ok(())
    }

    #[test]
    fn test_composite_etag_detection() {
        assert!(is_composite_etag("9b2cf535f27731c974343645a3985328-12"));
        assert!(!is_composite_etag("9b2cf535f27731c974343645a3985328"));
    }

    #[tokio::test]
    async fn test_simple_upload_digest_match() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("db.zip");
        fs::write(&path, b"backup payload")?;

        let store = FakeStore::new();
        store.insert("db.zip", b"backup payload".to_vec());

        verify_upload(&store, &path, "db.zip").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_simple_upload_one_byte_difference() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("db.zip");
        fs::write(&path, b"backup payload")?;

        let store = FakeStore::new();
        store.insert("db.zip", b"backup paylaad".to_vec());

        let result = verify_upload(&store, &path, "db.zip").await;
        assert!(matches!(result, Err(AppError::VerificationMismatch(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_quoted_etag_is_stripped() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("db.zip");
        fs::write(&path, b"quoted")?;

        let store = FakeStore::new();
        let quoted = format!("\"{:x}\"", md5::compute(b"quoted"));
        store.insert_with_etag("db.zip", b"quoted".to_vec(), &quoted);

        verify_upload(&store, &path, "db.zip").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_multipart_etag_compares_size_only() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("big.7z");
        fs::write(&path, b"aaaaaaaa")?;

        let store = FakeStore::new();
        // Same length, different content: accepted on the multipart path.
        store.insert_with_etag("big.7z", b"bbbbbbbb".to_vec(), "\"0123456789abcdef-2\"");
        verify_upload(&store, &path, "big.7z").await?;

        store.insert_with_etag("big.7z", b"bbbbbbbbb".to_vec(), "0123456789abcdef-2");
        let result = verify_upload(&store, &path, "big.7z").await;
        assert!(matches!(result, Err(AppError::VerificationMismatch(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_remote_object_is_an_error() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("gone.zip");
        fs::write(&path, b"x")?;

        let store = FakeStore::new();
        let result = verify_upload(&store, &path, "gone.zip").await;
        assert!(matches!(result, Err(AppError::Store(_))));
        Ok(())
    }
}
