//! S3 object operations for one bucket.
//!
//! [`ObjectStore`] is the seam the sync engine writes through; [`S3Transport`]
//! is its `aws-sdk-s3` implementation. Transports are built and cached by the
//! client factory.

use crate::error::{S3fsError, S3fsResult};
use crate::types::ObjectMetadata;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Destination for copied files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads the file at `path` under `key`, replacing any existing object.
    ///
    /// The body is read from disk while uploading, not buffered up front.
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        metadata: &ObjectMetadata,
    ) -> S3fsResult<()>;
}

/// S3 transport bound to a single bucket.
#[derive(Clone, Debug)]
pub struct S3Transport {
    client: S3Client,
    bucket: String,
}

impl S3Transport {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Checks if an object exists (HEAD request).
    pub async fn exists(&self, key: &str) -> S3fsResult<bool> {
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
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(S3fsError::S3(format!(
                        "head object failed for {key}: {}",
                        DisplayErrorContext(&service_err)
                    )))
                }
            }
        }
    }

    /// Builds a presigned GET URL valid for `expires_in`.
    ///
    /// `content_disposition` overrides the response header, which is how
    /// forced downloads are delivered.
    pub async fn presigned_get(
        &self,
        key: &str,
        expires_in: Duration,
        content_disposition: Option<&str>,
    ) -> S3fsResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| S3fsError::S3(format!("invalid presign expiry for {key}: {e}")))?;

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(disposition) = content_disposition {
            request = request.response_content_disposition(disposition);
        }

        let presigned = request.presigned(presigning).await.map_err(|e| {
            S3fsError::S3(format!(
                "presign failed for {key}: {}",
                DisplayErrorContext(&e)
            ))
        })?;

        Ok(presigned.uri().to_string())
    }
}

#[async_trait]
impl ObjectStore for S3Transport {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        metadata: &ObjectMetadata,
    ) -> S3fsResult<()> {
        let body = ByteStream::from_path(path).await.map_err(|e| {
            S3fsError::S3(format!("cannot read {} for {key}: {e}", path.display()))
        })?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);

        if let Some(ref cache_control) = metadata.cache_control {
            request = request.cache_control(cache_control);
        }
        if let Some(ref sse) = metadata.server_side_encryption {
            request = request.server_side_encryption(ServerSideEncryption::from(sse.as_str()));
        }
        if let Some(ref content_type) = metadata.content_type {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|e| {
            S3fsError::S3(format!("upload failed for {key}: {}", DisplayErrorContext(&e)))
        })?;

        debug!("uploaded {} to s3://{}/{key}", path.display(), self.bucket);
        Ok(())
    }
}
