//! s3fs error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for s3fs operations.
pub type S3fsResult<T> = Result<T, S3fsError>;

/// Errors that can occur while resolving configuration, building clients,
/// scanning local trees, copying files or evaluating delivery rules.
#[derive(Debug, Error)]
pub enum S3fsError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("cannot construct storage client: {0}")]
    ClientConstruction(String),

    #[error("cannot scan {path}: {reason}")]
    Scan { path: PathBuf, reason: String },

    #[error("copy of {path} to {key} failed: {reason}")]
    Copy {
        path: PathBuf,
        key: String,
        reason: String,
    },

    #[error("{list} rule on line {line} skipped ({pattern}): {reason}")]
    PolicyEvaluation {
        list: String,
        line: usize,
        pattern: String,
        reason: String,
    },

    #[error("S3 operation failed: {0}")]
    S3(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl S3fsError {
    pub(crate) fn scan(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        S3fsError::Scan {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
