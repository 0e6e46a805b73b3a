//! src/services/object_store.rs
//!
//! ObjectStore — the byte-addressable remote store boundary consumed by the
//! storage gateway. The production implementation keeps object payloads on
//! local disk sharded beneath `root/{bucket}/{shard}/{shard}/{key}` with a
//! per-bucket marker file for bucket metadata and a sidecar policy document.
//! Everything the gateway needs is behind the [`ObjectStore`] trait so tests
//! can substitute a failing store.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("region `{0}` is not supported")]
    UnsupportedRegion(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// The four operations the asset pipeline needs from a remote object store.
///
/// All operations may fail with a transport-level [`ObjectStoreError`].
/// `create_bucket` on an existing bucket fails with `BucketAlreadyExists`,
/// which callers racing on first provisioning are expected to swallow.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether a bucket with this name exists.
    async fn bucket_exists(&self, name: &str) -> ObjectStoreResult<bool>;

    /// Create a bucket in the given region.
    async fn create_bucket(&self, name: &str, region: &str) -> ObjectStoreResult<()>;

    /// Attach an access policy document to an existing bucket.
    async fn set_bucket_policy(&self, name: &str, policy_json: &str) -> ObjectStoreResult<()>;

    /// Store `bytes` under `key` in `bucket`, overwriting any prior object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> ObjectStoreResult<()>;
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const BUCKET_MARKER: &str = ".bucket.json";
const POLICY_FILE: &str = ".policy.json";
const SUPPORTED_REGIONS: [&str; 6] = [
    "local",
    "mx-bcs-1",
    "us-east-1",
    "us-west-2",
    "eu-west-1",
    "ap-southeast-1",
];

/// Bucket metadata persisted in the marker file.
#[derive(Serialize, Deserialize, Debug)]
struct BucketMarker {
    id: Uuid,
    name: String,
    region: String,
    created_at: chrono::DateTime<Utc>,
}

/// Filesystem-backed [`ObjectStore`].
///
/// Layout beneath `root`:
/// - `{bucket}/.bucket.json` — marker proving the bucket exists
/// - `{bucket}/.policy.json` — last applied policy document
/// - `{bucket}/{shard}/{shard}/{key}` — object payloads, two-level sharded
///
/// The struct holds no open handles and is cheap to clone behind an `Arc`.
#[derive(Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory holding all buckets. Used by the readiness probe.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that begin with `/` or contain `..`, control bytes,
    /// or backslashes.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules: 3–63 characters, lowercase letters,
    /// digits, dots and hyphens only, sane edge characters, nothing that
    /// looks like an IPv4 address.
    fn ensure_bucket_name_safe(name: &str) -> ObjectStoreResult<()> {
        let trimmed = name.trim();
        if trimmed != name {
            return Err(ObjectStoreError::InvalidBucketName {
                name: name.to_string(),
                reason: "cannot begin or end with whitespace".into(),
            });
        }

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return Err(ObjectStoreError::InvalidBucketName {
                name: name.to_string(),
                reason: "must be between 3 and 63 characters".into(),
            });
        }

        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(ObjectStoreError::InvalidBucketName {
                name: name.to_string(),
                reason: "allowed characters are lowercase letters, digits, dots, and hyphens"
                    .into(),
            });
        }

        if name.starts_with('.')
            || name.ends_with('.')
            || name.starts_with('-')
            || name.ends_with('-')
        {
            return Err(ObjectStoreError::InvalidBucketName {
                name: name.to_string(),
                reason: "must start and end with a lowercase letter or digit".into(),
            });
        }

        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return Err(ObjectStoreError::InvalidBucketName {
                name: name.to_string(),
                reason: "cannot contain consecutive dots or dot-hyphen combinations".into(),
            });
        }

        if is_ipv4_like(name) {
            return Err(ObjectStoreError::InvalidBucketName {
                name: name.to_string(),
                reason: "must not be formatted like an IP address".into(),
            });
        }

        Ok(())
    }

    /// Validate region string against SUPPORTED_REGIONS, case-insensitively.
    fn ensure_region_valid(region: &str) -> ObjectStoreResult<()> {
        if SUPPORTED_REGIONS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(region))
        {
            Ok(())
        } else {
            Err(ObjectStoreError::UnsupportedRegion(region.to_string()))
        }
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(bucket/key) and returns the first two bytes as lowercase
    /// hexadecimal strings (00–ff). Keeps file counts per directory low.
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, key);
        let mut path = self.bucket_root(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn require_bucket(&self, bucket: &str) -> ObjectStoreResult<()> {
        Self::ensure_bucket_name_safe(bucket)?;
        let marker = self.bucket_root(bucket).join(BUCKET_MARKER);
        match fs::try_exists(&marker).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ObjectStoreError::BucketNotFound(bucket.to_string())),
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    /// Durably write `bytes` at `path` via a temp file and rename.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> ObjectStoreResult<()> {
        let parent = path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let mut file = File::create(&tmp_path).await?;
        let steps = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        };
        if let Err(err) = steps.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(path).await?;
                fs::rename(&tmp_path, path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }
        Ok(())
    }

    /// Open an object for reading. Returns its size alongside the handle so
    /// callers can set `Content-Length`.
    pub async fn get_object_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> ObjectStoreResult<(File, u64)> {
        Self::ensure_key_safe(key)?;
        self.require_bucket(bucket).await?;

        let path = self.object_path(bucket, key);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                ObjectStoreError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn bucket_exists(&self, name: &str) -> ObjectStoreResult<bool> {
        Self::ensure_bucket_name_safe(name)?;
        let marker = self.bucket_root(name).join(BUCKET_MARKER);
        Ok(fs::try_exists(&marker).await?)
    }

    async fn create_bucket(&self, name: &str, region: &str) -> ObjectStoreResult<()> {
        Self::ensure_bucket_name_safe(name)?;
        let normalized_region = region.to_lowercase();
        Self::ensure_region_valid(&normalized_region)?;

        let bucket_root = self.bucket_root(name);
        fs::create_dir_all(&bucket_root).await?;

        let marker_path = bucket_root.join(BUCKET_MARKER);
        // The marker is the existence witness; racing creators see
        // AlreadyExists from the exclusive create below.
        let marker = BucketMarker {
            id: Uuid::new_v4(),
            name: name.to_string(),
            region: normalized_region,
            created_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&marker)
            .map_err(|err| ObjectStoreError::Io(io::Error::other(err)))?;

        let mut open = fs::OpenOptions::new();
        open.write(true).create_new(true);
        match open.open(&marker_path).await {
            Ok(mut file) => {
                file.write_all(&body).await?;
                file.sync_all().await?;
                debug!("created bucket `{}` at {}", name, bucket_root.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(ObjectStoreError::BucketAlreadyExists(name.to_string()))
            }
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    async fn set_bucket_policy(&self, name: &str, policy_json: &str) -> ObjectStoreResult<()> {
        self.require_bucket(name).await?;
        let policy_path = self.bucket_root(name).join(POLICY_FILE);
        Self::write_atomic(&policy_path, policy_json.as_bytes()).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;
        self.require_bucket(bucket).await?;

        let path = self.object_path(bucket, key);
        Self::write_atomic(&path, &bytes).await?;
        debug!(
            "stored object `{}/{}` ({} bytes, {})",
            bucket,
            key,
            bytes.len(),
            content_type
        );
        Ok(())
    }
}

/// Check if a string matches IPv4-like dotted decimal form.
/// Rejects names formatted like `1.2.3.4`.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    for segment in parts {
        if segment.is_empty() || segment.len() > 3 {
            return false;
        }
        if segment.chars().any(|c| !c.is_ascii_digit()) {
            return false;
        }
        if segment.parse::<u8>().is_err() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &tempfile::TempDir) -> FsObjectStore {
        FsObjectStore::new(dir.path())
    }

    #[tokio::test]
    async fn create_bucket_then_exists() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        assert!(!store.bucket_exists("rentals").await.unwrap());
        store.create_bucket("rentals", "local").await.unwrap();
        assert!(store.bucket_exists("rentals").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_create_reports_already_exists() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        store.create_bucket("rentals", "local").await.unwrap();
        let err = store.create_bucket("rentals", "local").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::BucketAlreadyExists(name) if name == "rentals"));
    }

    #[tokio::test]
    async fn put_then_read_back() {
        let dir = tempdir().unwrap();
        let store = store(&dir);
        store.create_bucket("rentals", "local").await.unwrap();

        store
            .put_object("rentals", "abc.png", Bytes::from_static(b"png-bytes"), "image/png")
            .await
            .unwrap();

        let (_file, len) = store.get_object_reader("rentals", "abc.png").await.unwrap();
        assert_eq!(len, 9);
    }

    #[tokio::test]
    async fn put_into_missing_bucket_fails() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        let err = store
            .put_object("rentals", "abc.png", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::BucketNotFound(_)));
    }

    #[tokio::test]
    async fn rejects_traversal_keys_and_bad_bucket_names() {
        let dir = tempdir().unwrap();
        let store = store(&dir);
        store.create_bucket("rentals", "local").await.unwrap();

        let err = store
            .put_object("rentals", "../escape", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::InvalidObjectKey));

        assert!(matches!(
            store.create_bucket("Bad_Name", "local").await.unwrap_err(),
            ObjectStoreError::InvalidBucketName { .. }
        ));
        assert!(matches!(
            store.create_bucket("10.0.0.1", "local").await.unwrap_err(),
            ObjectStoreError::InvalidBucketName { .. }
        ));
        assert!(matches!(
            store.create_bucket("rentals2", "moon-base-1").await.unwrap_err(),
            ObjectStoreError::UnsupportedRegion(_)
        ));
    }

    #[tokio::test]
    async fn policy_requires_existing_bucket() {
        let dir = tempdir().unwrap();
        let store = store(&dir);

        let err = store
            .set_bucket_policy("rentals", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::BucketNotFound(_)));

        store.create_bucket("rentals", "local").await.unwrap();
        store.set_bucket_policy("rentals", "{}").await.unwrap();
    }
}
