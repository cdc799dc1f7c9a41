//! Mirrored image storage on an S3-compatible bucket
//!
//! Cloudflare R2 by default; Supabase Storage or any other
//! S3-compatible endpoint via `storage.endpoint`.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;

use super::{ObjectStore, build_r2_http_client, join_public_url};
use crate::error::AppError;

/// Media storage service
///
/// Uploads mirrored images and returns public URLs.
pub struct MediaStorage {
    /// S3-compatible client
    client: S3Client,
    /// Bucket name
    bucket: String,
    /// Public URL base
    /// e.g., "https://abc.supabase.co/storage/v1/object/public/project-images"
    public_url: String,
}

impl MediaStorage {
    /// Create new media storage client
    ///
    /// # Errors
    /// Returns error if no endpoint can be resolved from configuration
    pub async fn new(config: &crate::config::StorageConfig) -> Result<Self, AppError> {
        use aws_sdk_s3::config::BehaviorVersion;
        use aws_sdk_s3::config::{Credentials, Region};

        let endpoint = config.endpoint_url()?;

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "studio-mirror",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .http_client(build_r2_http_client())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        tracing::debug!(%endpoint, bucket = %config.bucket, "Object store client configured");

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_url: config.public_url.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for MediaStorage {
    /// Upload with overwrite semantics
    ///
    /// # Example
    /// ```ignore
    /// storage.put("1234_1700000000000.png", image_data, "image/png").await?;
    /// ```
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        use aws_sdk_s3::primitives::ByteStream;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .cache_control("public, max-age=31536000") // 1 year
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Object upload failed: {}", e)))?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_url, key)
    }
}
