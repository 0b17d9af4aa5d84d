//! Storage client construction with per-configuration caching.
//!
//! Building an S3 client resolves credentials and sets up the HTTP stack, so
//! a factory keeps one transport per distinct credential/region/endpoint
//! tuple for as long as the factory lives. Callers that want process-wide
//! reuse hold one factory for the whole process.

use crate::config::{CredentialSource, ResolvedConfig};
use crate::error::{S3fsError, S3fsResult};
use crate::s3_transport::S3Transport;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_sdk_s3::Client as S3Client;
use aws_types::region::Region;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Identity of a built client. Secrets only enter through a SHA-256 fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ClientKey {
    credentials: String,
    region: String,
    endpoint: Option<String>,
    bucket: String,
}

impl ClientKey {
    fn for_config(config: &ResolvedConfig) -> Self {
        Self {
            credentials: credential_fingerprint(&config.credentials),
            region: config.region.clone(),
            endpoint: config.endpoint_url(),
            bucket: config.bucket.clone(),
        }
    }
}

/// Builds and caches [`S3Transport`]s.
#[derive(Default)]
pub struct StorageClientFactory {
    clients: RwLock<HashMap<ClientKey, Arc<S3Transport>>>,
}

impl StorageClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transport for `config`, building it on first use.
    pub async fn client_for(&self, config: &ResolvedConfig) -> S3fsResult<Arc<S3Transport>> {
        let key = ClientKey::for_config(config);

        // Fast path: already built for this tuple
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(&key) {
                return Ok(Arc::clone(client));
            }
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        let transport = Arc::new(build_transport(config)?);
        debug!(
            "built S3 client for bucket {} in {} (endpoint: {:?})",
            config.bucket, config.region, key.endpoint
        );
        clients.insert(key, Arc::clone(&transport));
        Ok(transport)
    }

    /// Number of distinct clients built so far.
    pub async fn cached_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Drops every cached client (after a configuration change).
    pub async fn clear(&self) {
        self.clients.write().await.clear();
    }
}

fn build_transport(config: &ResolvedConfig) -> S3fsResult<S3Transport> {
    let mut builder = aws_sdk_s3::Config::builder()
        .region(Region::new(config.region.clone()))
        .behavior_version_latest();

    builder = match &config.credentials {
        CredentialSource::Static {
            access_key,
            secret_key,
        } => builder.credentials_provider(aws_credential_types::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "s3fs-settings",
        )),
        CredentialSource::InstanceProfile { .. } => {
            builder.credentials_provider(ImdsCredentialsProvider::builder().build())
        }
        CredentialSource::Missing => {
            return Err(S3fsError::ClientConstruction(
                "no access key and secret key configured and use_instance_profile is disabled"
                    .into(),
            ));
        }
    };

    if let Some(endpoint) = config.endpoint_url() {
        validate_endpoint(&endpoint)?;
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    Ok(S3Transport::new(
        S3Client::from_conf(builder.build()),
        config.bucket.clone(),
    ))
}

fn validate_endpoint(endpoint: &str) -> S3fsResult<()> {
    let host = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);

    let invalid = host.is_empty()
        || host.starts_with(':')
        || host
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'));

    if invalid {
        return Err(S3fsError::ClientConstruction(format!(
            "invalid custom endpoint {endpoint:?}"
        )));
    }
    Ok(())
}

fn credential_fingerprint(credentials: &CredentialSource) -> String {
    let mut hasher = Sha256::new();
    match credentials {
        CredentialSource::Static {
            access_key,
            secret_key,
        } => {
            hasher.update(b"static\0");
            hasher.update(access_key.as_bytes());
            hasher.update(b"\0");
            hasher.update(secret_key.as_bytes());
        }
        CredentialSource::InstanceProfile { cache_location } => {
            hasher.update(b"instance-profile\0");
            hasher.update(cache_location.as_deref().unwrap_or_default().as_bytes());
        }
        CredentialSource::Missing => hasher.update(b"missing"),
    }
    hex::encode(hasher.finalize())
}
