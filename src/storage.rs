use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use uuid::Uuid;

use crate::config::AppConfig;

/// Lifetime of a presigned upload URL.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// Every admin upload lands under this prefix.
pub const UPLOAD_PREFIX: &str = "uploads";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid presigning config: {0}")]
    Config(String),
    #[error("presign failed: {0}")]
    Presign(String),
}

/// MediaStore
///
/// Object store for admin-uploaded media (post covers, inline images, project
/// screenshots). Handlers never talk to S3 directly.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Creates the bucket when it is missing. Only called for the local MinIO setup.
    async fn ensure_bucket(&self);

    /// URL the browser can `PUT` one object to, valid for a few minutes. The upload must
    /// carry exactly `content_type`.
    async fn presign_upload(&self, key: &str, content_type: &str) -> Result<String, StorageError>;
}

pub type StorageState = Arc<dyn MediaStore>;

/// upload_key
///
/// Fresh object key for an upload. Only the extension of the client's file name is kept,
/// lowercased; anything that is not plain alphanumerics becomes `bin`.
pub fn upload_key(filename: &str) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());

    format!("{UPLOAD_PREFIX}/{}.{extension}", Uuid::new_v4())
}

/// S3MediaStore
///
/// aws-sdk-s3 client aimed at MinIO locally and at the Supabase Storage S3 gateway in
/// production; both need path-style addressing.
#[derive(Clone)]
pub struct S3MediaStore {
    client: s3::Client,
    bucket: String,
}

impl S3MediaStore {
    pub fn from_config(config: &AppConfig) -> Self {
        let credentials =
            s3::config::Credentials::new(&config.s3_key, &config.s3_secret, None, None, "folio-env");

        let s3_config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .region(s3::config::Region::new(config.s3_region.clone()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
        }
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn ensure_bucket(&self) {
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => tracing::info!(bucket = %self.bucket, "created media bucket"),
            // Already exists, or the store refuses; uploads will surface real problems.
            Err(e) => tracing::debug!(error = %e, bucket = %self.bucket, "create_bucket skipped"),
        }
    }

    async fn presign_upload(&self, key: &str, content_type: &str) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}

/// MockMediaStore
///
/// Test double: hands out predictable URLs, or fails every call.
#[derive(Clone, Default)]
pub struct MockMediaStore {
    failing: bool,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { failing: true }
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn ensure_bucket(&self) {}

    async fn presign_upload(&self, key: &str, _content_type: &str) -> Result<String, StorageError> {
        if self.failing {
            return Err(StorageError::Presign("mock store unavailable".to_string()));
        }
        Ok(format!("http://localhost:9000/folio-test/{key}?X-Amz-Signature=mock"))
    }
}
