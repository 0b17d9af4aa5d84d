//! Shared types for sync passes.

use crate::error::S3fsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A named local file system root mirrored into the bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileScheme {
    Public,
    Private,
}

impl FileScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileScheme::Public => "public",
            FileScheme::Private => "private",
        }
    }

    /// Folder the scheme's files live under inside the root folder.
    pub fn folder_name(&self) -> String {
        format!("s3fs-{}", self.as_str())
    }
}

impl fmt::Display for FileScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileScheme {
    type Err = S3fsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().trim_end_matches("://") {
            "public" => Ok(FileScheme::Public),
            "private" => Ok(FileScheme::Private),
            other => Err(S3fsError::Configuration(format!(
                "unknown file scheme {other:?}, expected \"public\" or \"private\""
            ))),
        }
    }
}

/// Per-object metadata sent with every upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub cache_control: Option<String>,
    /// `x-amz-server-side-encryption` value.
    pub server_side_encryption: Option<String>,
    pub content_type: Option<String>,
}

/// A file that could not be copied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CopyFailure {
    pub path: PathBuf,
    pub key: String,
    pub error: String,
}

/// Outcome of one sync pass.
#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    pub root: PathBuf,
    pub destination_prefix: String,
    /// Destination keys written successfully.
    pub copied: Vec<String>,
    pub failed: Vec<CopyFailure>,
    /// True when the pass was cancelled before every file was scheduled.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub(crate) fn begin(root: &Path, destination_prefix: &str) -> Self {
        let now = Utc::now();
        Self {
            root: root.to_path_buf(),
            destination_prefix: destination_prefix.to_string(),
            copied: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn copied_count(&self) -> usize {
        self.copied.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// True when nothing failed and the pass ran to completion.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    pub fn failed_paths(&self) -> Vec<&Path> {
        self.failed.iter().map(|f| f.path.as_path()).collect()
    }
}
