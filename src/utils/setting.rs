// Transfer and hashing constants shared by the upload pipeline.

/// Read buffer used when streaming a local file through the MD5 digest.
pub const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Preferred multipart part size. The object store rejects parts below 5 MiB
/// (except the last one).
pub const MULTIPART_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Smallest multipart threshold accepted from configuration.
pub const MIN_MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Hard limit on the number of parts in one multipart upload.
pub const MAX_MULTIPART_PARTS: u64 = 10_000;

/// Parts of a single object uploaded concurrently.
pub const MULTIPART_CONCURRENCY: usize = 4;

// User metadata keys written on every uploaded object.
pub const META_ORIGINAL_PATH: &str = "original-path";
pub const META_UPLOAD_DATE: &str = "upload-date";
