//! src/services/storage_gateway.rs
//!
//! StorageGateway — owns bucket provisioning and file ingestion. Turns raw
//! uploaded byte payloads into publicly retrievable URLs of the shape
//! `{scheme}://{endpoint}:{port}/{bucket}/{key}{extension}`.
//!
//! The gateway is stateless per upload; its only retained state is the
//! one-time bucket readiness check, guarded so concurrent first calls
//! provision exactly once.

use crate::services::object_store::{ObjectStore, ObjectStoreError};
use bytes::Bytes;
use futures::{StreamExt, stream};
use serde::Serialize;
use serde_json::json;
use std::{path::Path, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// MIME types accepted for item media.
pub const ALLOWED_MIME_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "video/mp4"];

/// Maximum number of in-flight uploads per `upload_many` call. Each upload
/// holds its full payload in memory, so the fan-out is capped.
const MAX_CONCURRENT_UPLOADS: usize = 8;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Bucket provisioning failed. Fatal: all uploads are refused until a
    /// manual re-check via [`StorageGateway::reset_bucket_state`].
    #[error("storage initialization failed: {0}")]
    Init(String),
    #[error("[{mimetype}] unsupported media type, allowed types: {allowed}", allowed = ALLOWED_MIME_TYPES.join(", "))]
    UnsupportedMediaType { mimetype: String },
    /// The remote put failed. Carries the generated key, not the client's
    /// filename, which is not authoritative. No automatic retry; the input
    /// payload is consumed.
    #[error("upload of object `{key}` failed: {source}")]
    UploadFailed {
        key: String,
        #[source]
        source: ObjectStoreError,
    },
}

pub type StorageGatewayResult<T> = Result<T, StorageError>;

/// An uploaded file as received at the transport boundary: fully buffered
/// payload plus the client-declared filename and MIME type.
///
/// Callers are expected to have size-capped the payload already (the HTTP
/// layer enforces a body limit); the gateway does not re-check sizes.
#[derive(Debug)]
pub struct UploadedAsset {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
}

/// The durable result of an upload: the generated object key (with the
/// original extension preserved) and its derived public URL.
#[derive(Serialize, Clone, Debug)]
pub struct StorageObject {
    pub key: String,
    pub url: String,
}

/// Bucket lifecycle: `Unknown -> (checking/provisioning) -> Ready | Failed`.
/// The transient states live inside the locked section of
/// `ensure_bucket_ready`; only the settled states are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketState {
    Unknown,
    Ready,
    Failed,
}

/// Public URL components for constructing object links. Kept separate from
/// the bind address: the endpoint is whatever clients can reach the object
/// store on.
#[derive(Debug, Clone)]
pub struct PublicUrlConfig {
    pub scheme: String,
    pub endpoint: String,
    pub port: u16,
}

pub struct StorageGateway {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    region: String,
    public_url: PublicUrlConfig,
    bucket_state: Mutex<BucketState>,
}

impl StorageGateway {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        public_url: PublicUrlConfig,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            region: region.into(),
            public_url,
            bucket_state: Mutex::new(BucketState::Unknown),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Ensure the configured bucket exists and carries the public-read
    /// policy. Idempotent and safe under concurrent first calls: the state
    /// mutex serializes provisioning, and an `AlreadyExists` from a racing
    /// creator counts as success.
    ///
    /// A settled `Failed` state keeps refusing until
    /// [`reset_bucket_state`](Self::reset_bucket_state).
    pub async fn ensure_bucket_ready(&self) -> StorageGatewayResult<()> {
        let mut state = self.bucket_state.lock().await;
        match *state {
            BucketState::Ready => Ok(()),
            BucketState::Failed => Err(StorageError::Init(format!(
                "bucket `{}` previously failed to initialize",
                self.bucket
            ))),
            BucketState::Unknown => match self.provision_bucket().await {
                Ok(()) => {
                    *state = BucketState::Ready;
                    Ok(())
                }
                Err(err) => {
                    *state = BucketState::Failed;
                    error!("bucket `{}` initialization failed: {}", self.bucket, err);
                    Err(StorageError::Init(err.to_string()))
                }
            },
        }
    }

    /// Clear a settled `Failed` state so the next call re-checks the bucket.
    /// Operator remediation hook; never called on the hot path.
    pub async fn reset_bucket_state(&self) {
        let mut state = self.bucket_state.lock().await;
        if *state == BucketState::Failed {
            warn!("resetting failed bucket state for `{}`", self.bucket);
            *state = BucketState::Unknown;
        }
    }

    async fn provision_bucket(&self) -> Result<(), ObjectStoreError> {
        if self.store.bucket_exists(&self.bucket).await? {
            return Ok(());
        }

        info!("bucket `{}` not found, creating it", self.bucket);
        match self.store.create_bucket(&self.bucket, &self.region).await {
            Ok(()) => {
                let policy = public_read_policy(&self.bucket);
                self.store
                    .set_bucket_policy(&self.bucket, &policy)
                    .await?;
                info!("bucket `{}` created with public-read policy", self.bucket);
            }
            // Lost a creation race with another process; the winner applies
            // the policy.
            Err(ObjectStoreError::BucketAlreadyExists(_)) => {
                info!("bucket `{}` was created concurrently", self.bucket);
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Validate, key, and store a single asset.
    ///
    /// The generated key is a fresh UUIDv4 plus the original extension; the
    /// client filename never reaches the store.
    pub async fn upload_one(&self, asset: UploadedAsset) -> StorageGatewayResult<StorageObject> {
        self.ensure_bucket_ready().await?;
        self.upload_prepared(asset).await
    }

    /// Upload path shared by `upload_one` and `upload_many`; assumes the
    /// bucket readiness check already ran.
    async fn upload_prepared(&self, asset: UploadedAsset) -> StorageGatewayResult<StorageObject> {
        if !ALLOWED_MIME_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&asset.content_type))
        {
            return Err(StorageError::UnsupportedMediaType {
                mimetype: asset.content_type,
            });
        }

        let extension = file_extension(&asset.filename);
        let key = format!("{}{}", Uuid::new_v4(), extension);

        if let Err(err) = self
            .store
            .put_object(&self.bucket, &key, asset.bytes, &asset.content_type)
            .await
        {
            error!("upload of `{}` failed: {}", key, err);
            return Err(StorageError::UploadFailed { key, source: err });
        }

        let url = format!(
            "{}://{}:{}/{}/{}",
            self.public_url.scheme, self.public_url.endpoint, self.public_url.port, self.bucket, key
        );
        Ok(StorageObject { key, url })
    }

    /// Upload a batch of assets concurrently, at most
    /// [`MAX_CONCURRENT_UPLOADS`] in flight.
    ///
    /// Partial-result semantics: the returned vector is positionally aligned
    /// with the input, each slot carrying that asset's own success or
    /// failure. A failed bucket readiness check fails the whole batch, since
    /// no upload can proceed.
    pub async fn upload_many(
        &self,
        assets: Vec<UploadedAsset>,
    ) -> StorageGatewayResult<Vec<StorageGatewayResult<StorageObject>>> {
        self.ensure_bucket_ready().await?;

        let mut indexed: Vec<(usize, StorageGatewayResult<StorageObject>)> =
            stream::iter(assets.into_iter().enumerate())
                .map(|(idx, asset)| async move { (idx, self.upload_prepared(asset).await) })
                .buffer_unordered(MAX_CONCURRENT_UPLOADS)
                .collect()
                .await;

        indexed.sort_by_key(|(idx, _)| *idx);
        Ok(indexed.into_iter().map(|(_, result)| result).collect())
    }
}

/// The public-read policy applied to freshly created buckets: anonymous
/// `s3:GetObject` on every key.
fn public_read_policy(bucket: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": ["*"] },
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
        }],
    })
    .to_string()
}

/// Extension of the declared filename including the leading dot, or empty if
/// the filename has none. Only the extension survives into the object key.
fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
