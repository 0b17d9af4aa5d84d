//! Local tree to bucket replication.
//!
//! A pass enumerates the whole tree first, so a tree that cannot be fully
//! read is never partially synced. Copies then run through a bounded pool;
//! a failed copy is recorded and the pass moves on to the next file.

use crate::config::ResolvedConfig;
use crate::error::{S3fsError, S3fsResult};
use crate::s3_transport::ObjectStore;
use crate::scanner::{DirectoryScan, DirectoryScanner};
use crate::types::{CopyFailure, ObjectMetadata, SyncReport};
use chrono::Utc;
use futures::future::ready;
use futures::stream::{self, StreamExt};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Cancellation flag shared between a running pass and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops scheduling new copies. In-flight copies still complete.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Copies local trees into the object store.
pub struct SyncEngine {
    config: Arc<ResolvedConfig>,
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
    excluded: Vec<PathBuf>,
}

/// Creates a sync engine for one invocation.
pub fn create_sync_engine(config: Arc<ResolvedConfig>, store: Arc<dyn ObjectStore>) -> SyncEngine {
    SyncEngine {
        config,
        store,
        concurrency: 1,
        excluded: Vec::new(),
    }
}

impl SyncEngine {
    /// Maximum number of copies in flight. Values below 1 mean 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Leaves `dir` out of every scan.
    pub fn with_excluded(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    /// Metadata attached to the object written for `path`.
    pub fn object_metadata(&self, path: &Path) -> ObjectMetadata {
        ObjectMetadata {
            cache_control: self.config.cache_control_header.clone(),
            server_side_encryption: self.config.encryption.header_value().map(str::to_string),
            content_type: Some(
                mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
            ),
        }
    }

    /// Replicates every file under `root` to `destination_prefix/<relative path>`.
    ///
    /// Fails only when the tree cannot be enumerated; per-file failures end
    /// up in the returned report.
    pub async fn sync_tree(
        &self,
        root: &Path,
        destination_prefix: &str,
        cancel: &CancelToken,
    ) -> S3fsResult<SyncReport> {
        let scanner = self
            .excluded
            .iter()
            .fold(DirectoryScanner::new(root), |scanner, dir| {
                scanner.with_excluded(dir.clone())
            });
        let scan = scanner.scan()?;
        self.sync_scan(scan, destination_prefix, cancel).await
    }

    /// Drains `scan` and replicates the files it yields.
    ///
    /// The walk runs to completion before the first upload, so a directory
    /// that fails to read partway through aborts the pass with nothing copied.
    pub async fn sync_scan(
        &self,
        scan: DirectoryScan,
        destination_prefix: &str,
        cancel: &CancelToken,
    ) -> S3fsResult<SyncReport> {
        let scan_root = scan.root().to_path_buf();
        let files = tokio::task::spawn_blocking(move || scan.collect::<S3fsResult<Vec<_>>>())
            .await
            .map_err(|e| S3fsError::scan(&scan_root, format!("scan task failed: {e}")))??;

        let prefix = destination_prefix.trim_matches('/');
        let total = files.len();
        info!(
            "syncing {total} files from {} to {prefix}/",
            scan_root.display()
        );

        let mut report = SyncReport::begin(&scan_root, prefix);
        let mut outcomes = stream::iter(files)
            .take_while(|_| ready(!cancel.is_cancelled()))
            .map(|path| self.copy_file(&scan_root, prefix, path))
            .buffer_unordered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(key) => report.copied.push(key),
                Err(S3fsError::Copy { path, key, reason }) => {
                    warn!("failed to copy {} to {key}: {reason}", path.display());
                    report.failed.push(CopyFailure {
                        path,
                        key,
                        error: reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        report.cancelled = report.copied.len() + report.failed.len() < total;
        report.finished_at = Utc::now();

        if report.cancelled {
            info!(
                "sync to {prefix}/ cancelled after {} of {total} files",
                report.copied.len() + report.failed.len()
            );
        }
        info!(
            "copied {} files to {prefix}/, {} failed",
            report.copied_count(),
            report.failed_count()
        );
        Ok(report)
    }

    async fn copy_file(&self, root: &Path, prefix: &str, path: PathBuf) -> S3fsResult<String> {
        let key = match destination_key(prefix, root, &path) {
            Ok(key) => key,
            Err(reason) => {
                return Err(S3fsError::Copy {
                    path,
                    key: String::new(),
                    reason,
                });
            }
        };

        let metadata = self.object_metadata(&path);
        let uploaded = self.store.put_file(&key, &path, &metadata).await;
        if let Err(e) = uploaded {
            return Err(S3fsError::Copy {
                path,
                key,
                reason: e.to_string(),
            });
        }
        Ok(key)
    }
}

/// Builds `prefix/relative/path` for a file under `root`, always with `/`
/// separators. An empty prefix yields the bare relative path.
pub fn destination_key(prefix: &str, root: &Path, path: &Path) -> Result<String, String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| format!("{} is outside {}", path.display(), root.display()))?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => segments.push(
                name.to_str()
                    .ok_or_else(|| format!("{} is not valid UTF-8", path.display()))?,
            ),
            Component::CurDir => {}
            other => {
                return Err(format!(
                    "unexpected path component {:?} in {}",
                    other.as_os_str(),
                    path.display()
                ));
            }
        }
    }

    if segments.is_empty() {
        return Err(format!("{} has no relative path under the root", path.display()));
    }

    let relative = segments.join("/");
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        Ok(relative)
    } else {
        Ok(format!("{prefix}/{relative}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_prefix_and_relative_path() {
        let root = Path::new("/srv/files");
        assert_eq!(
            destination_key("site1/s3fs-public", root, &root.join("sub").join("b.txt")).unwrap(),
            "site1/s3fs-public/sub/b.txt"
        );
        assert_eq!(
            destination_key("/s3fs-private/", root, &root.join("c.txt")).unwrap(),
            "s3fs-private/c.txt"
        );
        assert_eq!(destination_key("", root, &root.join("c.txt")).unwrap(), "c.txt");
    }

    #[test]
    fn key_rejects_paths_outside_root() {
        assert!(destination_key("p", Path::new("/srv/files"), Path::new("/etc/passwd")).is_err());
        assert!(destination_key("p", Path::new("/srv/files"), Path::new("/srv/files")).is_err());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
