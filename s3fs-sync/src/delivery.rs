//! External URLs for stored objects, following the policy chosen by
//! [`PathPolicyMatcher`](crate::policy::PathPolicyMatcher).

use crate::config::{DEFAULT_REGION, ResolvedConfig};
use crate::error::S3fsResult;
use crate::policy::{DEFAULT_TIMEOUT_SECS, Policy};
use crate::s3_transport::S3Transport;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builds delivery URLs for keys in the configured bucket.
#[derive(Clone, Debug)]
pub struct DeliveryUrls {
    config: Arc<ResolvedConfig>,
}

impl DeliveryUrls {
    pub fn new(config: Arc<ResolvedConfig>) -> Self {
        Self { config }
    }

    fn scheme(&self) -> &'static str {
        if self.config.use_https { "https" } else { "http" }
    }

    /// Plain, unsigned URL of `key`.
    pub fn object_url(&self, key: &str) -> String {
        let key = encode_key(key);
        let config = &self.config;

        if config.use_cname {
            return format!("{}://{}/{key}", self.scheme(), config.domain);
        }
        if let Some(endpoint) = config.endpoint_url() {
            return format!("{endpoint}/{}/{key}", config.bucket);
        }

        let host = match config.region.as_str() {
            DEFAULT_REGION => "s3.amazonaws.com".to_string(),
            "cn-north-1" => "s3.cn-north-1.amazonaws.com.cn".to_string(),
            region => format!("s3.{region}.amazonaws.com"),
        };
        format!("{}://{}.{host}/{key}", self.scheme(), config.bucket)
    }

    /// URL delivering `key` under `policy`.
    ///
    /// Signed URLs cannot be served through a CNAME domain, so with
    /// `use_cname` presigned and save-as policies fall back to the plain URL.
    pub async fn url_for(
        &self,
        key: &str,
        policy: Policy,
        client: &S3Transport,
    ) -> S3fsResult<String> {
        match policy {
            Policy::NoPolicy => Ok(self.object_url(key)),
            Policy::Torrent => Ok(format!("{}?torrent", self.object_url(key))),
            Policy::PresignedUrl { .. } | Policy::SaveAs if self.config.use_cname => {
                debug!("use_cname is enabled, serving {key} unsigned");
                Ok(self.object_url(key))
            }
            Policy::PresignedUrl { timeout_seconds } => {
                client
                    .presigned_get(key, Duration::from_secs(timeout_seconds), None)
                    .await
            }
            Policy::SaveAs => {
                client
                    .presigned_get(
                        key,
                        Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                        Some(&attachment_disposition(key)),
                    )
                    .await
            }
        }
    }
}

/// `Content-Disposition` forcing a download under the key's file name.
pub fn attachment_disposition(key: &str) -> String {
    let file_name = key.rsplit('/').next().unwrap_or(key).replace('"', "");
    format!("attachment; filename=\"{file_name}\"")
}

fn encode_key(key: &str) -> String {
    key.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
