use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Typed classification of object-store failures. Handlers branch on the
/// variant, never on error message text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,

    #[error("bucket does not exist")]
    NoSuchBucket,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An object fetched from the store, with the metadata print assembly needs.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Blob storage seam. Production uses S3/MinIO; tests swap in an in-memory map.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError>;

    /// Idempotent: deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError>;
}

/// S3 / MinIO implementation over the AWS SDK client built at startup.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(classify)?;

        debug!("Stored object s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound
                } else {
                    classify(e)
                }
            })?;

        let content_type = output.content_type().map(str::to_string);
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Other(anyhow::anyhow!("S3 body read failed: {e}")))?
            .into_bytes();

        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        // S3 DeleteObject returns success for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StoreError::Other(anyhow::anyhow!("invalid presign expiry: {e}")))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(classify)?;

        Ok(presigned.uri().to_string())
    }
}

/// Maps an SDK error code onto the tagged variants the callers branch on.
fn classify<E>(err: E) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().map(str::to_string);
    match code.as_deref() {
        Some("NoSuchKey") => StoreError::NotFound,
        Some("NoSuchBucket") => StoreError::NoSuchBucket,
        _ => StoreError::Other(anyhow::Error::new(err)),
    }
}
