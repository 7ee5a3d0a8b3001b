//! S3-compatible bucket client used to mirror generated assets.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the bucket mirror.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// S3 API endpoint
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Region ("auto" for R2-style endpoints)
    pub region: String,
    /// Key prefix for every mirrored object.
    pub prefix: String,
}

impl BucketConfig {
    /// Create config from environment variables.
    ///
    /// Returns `Ok(None)` when no endpoint is configured; mirroring is optional.
    pub fn from_env() -> StorageResult<Option<Self>> {
        let Ok(endpoint_url) = std::env::var("ASSET_BUCKET_ENDPOINT_URL") else {
            return Ok(None);
        };
        Ok(Some(Self {
            endpoint_url,
            access_key_id: std::env::var("ASSET_BUCKET_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("ASSET_BUCKET_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("ASSET_BUCKET_SECRET_ACCESS_KEY").map_err(|_| {
                StorageError::config_error("ASSET_BUCKET_SECRET_ACCESS_KEY not set")
            })?,
            bucket_name: std::env::var("ASSET_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("ASSET_BUCKET_NAME not set"))?,
            region: std::env::var("ASSET_BUCKET_REGION").unwrap_or_else(|_| "auto".to_string()),
            prefix: std::env::var("ASSET_BUCKET_PREFIX").unwrap_or_else(|_| "broadcasts".to_string()),
        }))
    }
}

/// Destination for mirrored files.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    fn object_key(&self, story_id: &str, file_name: &str) -> String {
        format!("{story_id}/{file_name}")
    }

    async fn put_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()>;
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct BucketClient {
    client: Client,
    bucket: String,
    prefix: String,
}

impl BucketClient {
    pub fn new(config: BucketConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "bcast",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            prefix: config.prefix.trim_matches('/').to_string(),
        }
    }

    /// Object key for a story asset.
    pub fn key_for(&self, story_id: &str, file_name: &str) -> String {
        if self.prefix.is_empty() {
            format!("{story_id}/{file_name}")
        } else {
            format!("{}/{story_id}/{file_name}", self.prefix)
        }
    }

    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    pub async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    /// Temporary signed GET URL for a mirrored object.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let message = e.to_string();
                if message.contains("NotFound") || message.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::DownloadFailed(message))
                }
            }
        }
    }
}

#[async_trait]
impl ObjectSink for BucketClient {
    fn object_key(&self, story_id: &str, file_name: &str) -> String {
        self.key_for(story_id, file_name)
    }

    async fn put_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        self.upload_file(path, key, content_type).await
    }
}
