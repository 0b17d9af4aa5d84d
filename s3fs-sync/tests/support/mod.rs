//! Shared test helpers: in-memory object store, settings and local trees.
#![allow(dead_code)]

use async_trait::async_trait;
use s3fs_sync::s3_transport::ObjectStore;
use s3fs_sync::{
    CancelToken, ConfigResolver, EnvironmentOverrides, ObjectMetadata, ResolvedConfig,
    S3fsError, S3fsResult, S3fsSettings,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub metadata: ObjectMetadata,
}

/// Object store keeping everything in memory.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failing_fragment: Option<String>,
    cancel_after: Option<(usize, CancelToken)>,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every key containing `fragment` with a simulated network error.
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            failing_fragment: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    /// Triggers `token` once `puts` objects have been written.
    pub fn cancelling_after(puts: usize, token: CancelToken) -> Self {
        Self {
            cancel_after: Some((puts, token)),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        metadata: &ObjectMetadata,
    ) -> S3fsResult<()> {
        if let Some(ref fragment) = self.failing_fragment {
            if key.contains(fragment.as_str()) {
                return Err(S3fsError::S3(format!(
                    "upload failed for {key}: simulated network error"
                )));
            }
        }

        let body = tokio::fs::read(path).await?;
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                metadata: metadata.clone(),
            },
        );

        let written = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, ref token)) = self.cancel_after {
            if written >= limit {
                token.cancel();
            }
        }
        Ok(())
    }
}

/// Settings accepted by the resolver, with static test credentials.
pub fn base_settings() -> S3fsSettings {
    S3fsSettings {
        access_key: "AKIATEST".into(),
        secret_key: "test-secret".into(),
        bucket: "test-bucket".into(),
        ..S3fsSettings::default()
    }
}

pub fn resolve(settings: S3fsSettings) -> ResolvedConfig {
    ConfigResolver::resolve(settings, &EnvironmentOverrides::default())
        .expect("test settings must resolve")
}

/// Resolved config with a root folder, cache header and AES256 encryption.
pub fn sync_config(root_folder: &str) -> ResolvedConfig {
    resolve(S3fsSettings {
        root_folder: root_folder.into(),
        cache_control_header: "max-age=300".into(),
        encryption: "AES256".into(),
        ..base_settings()
    })
}

/// Writes each `(relative path, contents)` pair under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}

/// Per-test unique S3 prefix to prevent collisions.
pub fn unique_prefix() -> String {
    format!("test-runs/{}", Uuid::new_v4())
}
