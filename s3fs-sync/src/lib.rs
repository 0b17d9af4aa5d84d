//! Sync engine for s3fs.
//!
//! Replicates a site's local `public://` and `private://` trees into an
//! S3-compatible bucket and decides how requested paths are delivered:
//! - Settings resolution with environment credential overrides
//! - Cached S3 client construction (static keys or instance profile)
//! - Depth-first local tree scanning
//! - Continue-on-error, cancellable tree replication
//! - Presigned URL / save-as / torrent rule matching and delivery URLs

pub mod client_factory;
pub mod config;
pub mod delivery;
pub mod error;
pub mod policy;
pub mod s3_transport;
pub mod scanner;
pub mod service;
pub mod sync_engine;
pub mod types;

pub use client_factory::StorageClientFactory;
pub use config::{ConfigResolver, EnvironmentOverrides, ResolvedConfig, S3fsSettings};
pub use error::{S3fsError, S3fsResult};
pub use policy::{PathPolicyMatcher, Policy};
pub use service::{S3fsSync, SchemeRoots};
pub use sync_engine::{CancelToken, SyncEngine, create_sync_engine};
pub use types::*;
