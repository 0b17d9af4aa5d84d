//! Sync trigger: copy a named local file system into the bucket.

use crate::client_factory::StorageClientFactory;
use crate::config::ResolvedConfig;
use crate::error::{S3fsError, S3fsResult};
use crate::s3_transport::ObjectStore;
use crate::sync_engine::{CancelToken, create_sync_engine};
use crate::types::{FileScheme, SyncReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Local directories backing each file scheme.
#[derive(Clone, Debug, Default)]
pub struct SchemeRoots {
    pub public: Option<PathBuf>,
    pub private: Option<PathBuf>,
}

impl SchemeRoots {
    pub fn root(&self, scheme: FileScheme) -> Option<&Path> {
        match scheme {
            FileScheme::Public => self.public.as_deref(),
            FileScheme::Private => self.private.as_deref(),
        }
    }
}

/// Wires configuration, client factory and scheme roots to the sync engine.
pub struct S3fsSync {
    config: Arc<ResolvedConfig>,
    factory: Arc<StorageClientFactory>,
    roots: SchemeRoots,
    concurrency: usize,
}

impl S3fsSync {
    pub fn new(
        config: Arc<ResolvedConfig>,
        factory: Arc<StorageClientFactory>,
        roots: SchemeRoots,
    ) -> Self {
        Self {
            config,
            factory,
            roots,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Copies every local file of `scheme` into the bucket through the cached S3 client.
    pub async fn copy_local_tree_to_store(
        &self,
        scheme: FileScheme,
        cancel: &CancelToken,
    ) -> S3fsResult<SyncReport> {
        let client = self.factory.client_for(&self.config).await?;
        self.copy_local_tree_with(scheme, client, cancel).await
    }

    /// Same as [`copy_local_tree_to_store`](Self::copy_local_tree_to_store)
    /// with an explicit destination store.
    pub async fn copy_local_tree_with(
        &self,
        scheme: FileScheme,
        store: Arc<dyn ObjectStore>,
        cancel: &CancelToken,
    ) -> S3fsResult<SyncReport> {
        let root = self.roots.root(scheme).ok_or_else(|| {
            S3fsError::Configuration(format!("no local root configured for {scheme}://"))
        })?;

        let mut engine =
            create_sync_engine(Arc::clone(&self.config), store).with_concurrency(self.concurrency);

        // A private root nested in the public one must not leak under the public prefix.
        if scheme == FileScheme::Public {
            if let Some(private) = self.roots.private.as_ref() {
                engine = engine.with_excluded(private.clone());
            }
        }

        let prefix = self.config.destination_prefix(scheme);
        info!("copying local {scheme}:// files from {} into S3", root.display());
        let report = engine.sync_tree(root, &prefix, cancel).await?;
        info!(
            "copied local {scheme}:// files to S3 ({} copied, {} failed)",
            report.copied_count(),
            report.failed_count()
        );
        Ok(report)
    }
}
