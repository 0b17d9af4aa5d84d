//! s3fs configuration: the persisted settings record and its resolution.
//!
//! The persisted record mirrors the `s3fs.settings` keys one to one.
//! [`ConfigResolver::resolve`] layers environment overrides on top of it,
//! validates the enumerated fields and produces the immutable
//! [`ResolvedConfig`] every other component works from.

use crate::error::{S3fsError, S3fsResult};
use crate::types::FileScheme;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Environment variable overriding the persisted `access_key`.
pub const ACCESS_KEY_VAR: &str = "S3FS_ACCESS_KEY";

/// Environment variable overriding the persisted `secret_key`.
pub const SECRET_KEY_VAR: &str = "S3FS_SECRET_KEY";

/// Region used when the persisted `region` is empty.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Region codes accepted in the persisted `region` field.
pub const SUPPORTED_REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-1",
    "us-west-2",
    "us-gov-west-1",
    "eu-west-1",
    "eu-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "sa-east-1",
    "cn-north-1",
];

/// The persisted settings record.
///
/// Field names are the externally visible configuration keys and must not
/// change. Missing keys deserialize to empty strings / `false`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3fsSettings {
    pub access_key: String,
    pub secret_key: String,
    pub use_instance_profile: bool,
    /// Credential cache location used together with instance profiles.
    pub default_cache_config: String,
    pub bucket: String,
    pub region: String,
    pub use_cname: bool,
    pub use_customhost: bool,
    pub hostname: String,
    pub domain: String,
    pub cache_control_header: String,
    pub encryption: String,
    pub use_https: bool,
    pub ignore_cache: bool,
    pub use_s3_for_public: bool,
    pub no_rewrite_cssjs: bool,
    pub use_s3_for_private: bool,
    pub root_folder: String,
    pub presigned_urls: String,
    pub saveas: String,
    pub torrents: String,
}

impl S3fsSettings {
    /// Parses a settings record from JSON.
    pub fn from_json(raw: &str) -> S3fsResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Loads a settings record from a JSON file.
    pub fn load(path: &Path) -> S3fsResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Server-side encryption applied to every written object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encryption {
    #[default]
    None,
    Aes256,
    AwsKms,
}

impl Encryption {
    /// Value of the `x-amz-server-side-encryption` header, if any.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            Encryption::None => None,
            Encryption::Aes256 => Some("AES256"),
            Encryption::AwsKms => Some("aws:kms"),
        }
    }
}

impl FromStr for Encryption {
    type Err = S3fsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Ok(Encryption::None),
            "AES256" => Ok(Encryption::Aes256),
            "aws:kms" => Ok(Encryption::AwsKms),
            other => Err(S3fsError::Configuration(format!(
                "unsupported encryption {other:?}, expected \"\", \"AES256\" or \"aws:kms\""
            ))),
        }
    }
}

/// Where the storage client gets its credentials from.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum CredentialSource {
    /// EC2 instance profile credentials from the metadata service.
    InstanceProfile { cache_location: Option<String> },
    /// Explicit access/secret key pair.
    Static {
        access_key: String,
        secret_key: String,
    },
    /// Neither keys nor instance profile; client construction will fail.
    Missing,
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::InstanceProfile { cache_location } => f
                .debug_struct("InstanceProfile")
                .field("cache_location", cache_location)
                .finish(),
            CredentialSource::Static { access_key, .. } => f
                .debug_struct("Static")
                .field("access_key", access_key)
                .field("secret_key", &"<redacted>")
                .finish(),
            CredentialSource::Missing => f.write_str("Missing"),
        }
    }
}

/// Process-level credential overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvironmentOverrides {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl EnvironmentOverrides {
    /// Reads [`ACCESS_KEY_VAR`] and [`SECRET_KEY_VAR`] from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds overrides from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            access_key: non_empty(ACCESS_KEY_VAR),
            secret_key: non_empty(SECRET_KEY_VAR),
        }
    }
}

/// Validated configuration. Built only through [`ConfigResolver::resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ResolvedConfig {
    pub credentials: CredentialSource,
    pub bucket: String,
    /// Always a member of [`SUPPORTED_REGIONS`].
    pub region: String,
    pub use_cname: bool,
    pub domain: String,
    pub use_customhost: bool,
    pub hostname: String,
    pub cache_control_header: Option<String>,
    pub encryption: Encryption,
    /// Never starts or ends with a slash; empty means the bucket root.
    pub root_folder: String,
    pub use_https: bool,
    pub ignore_cache: bool,
    pub use_s3_for_public: bool,
    pub use_s3_for_private: bool,
    pub no_rewrite_cssjs: bool,
    pub presigned_urls: String,
    pub saveas: String,
    pub torrents: String,
}

impl ResolvedConfig {
    /// Key prefix under which a scheme's files are stored, e.g. `site1/s3fs-public`.
    pub fn destination_prefix(&self, scheme: FileScheme) -> String {
        if self.root_folder.is_empty() {
            scheme.folder_name()
        } else {
            format!("{}/{}", self.root_folder, scheme.folder_name())
        }
    }

    /// Custom S3 endpoint URL, when a custom host is enabled.
    pub fn endpoint_url(&self) -> Option<String> {
        if !self.use_customhost {
            return None;
        }
        let host = self.hostname.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            Some(host.to_string())
        } else {
            Some(format!("https://{host}"))
        }
    }
}

/// Merges persisted settings with environment overrides.
pub struct ConfigResolver;

impl ConfigResolver {
    /// Produces a validated [`ResolvedConfig`]. Pure apart from a warning log.
    pub fn resolve(
        persisted: S3fsSettings,
        overrides: &EnvironmentOverrides,
    ) -> S3fsResult<ResolvedConfig> {
        let bucket = persisted.bucket.trim().to_string();
        if bucket.is_empty() {
            return Err(S3fsError::Configuration("bucket must not be empty".into()));
        }

        let region = resolve_region(&persisted.region)?;
        let encryption: Encryption = persisted.encryption.parse()?;

        if persisted.use_cname && persisted.domain.trim().is_empty() {
            return Err(S3fsError::Configuration(
                "use_cname is enabled but domain is empty".into(),
            ));
        }
        if persisted.use_customhost && persisted.hostname.trim().is_empty() {
            return Err(S3fsError::Configuration(
                "use_customhost is enabled but hostname is empty".into(),
            ));
        }
        if persisted.use_cname
            && (has_rules(&persisted.presigned_urls) || has_rules(&persisted.saveas))
        {
            warn!("presigned URL and save-as rules have no effect while use_cname is enabled");
        }

        let credentials = if persisted.use_instance_profile {
            let cache = persisted.default_cache_config.trim();
            CredentialSource::InstanceProfile {
                cache_location: (!cache.is_empty()).then(|| cache.to_string()),
            }
        } else {
            let access_key = overrides
                .access_key
                .clone()
                .unwrap_or(persisted.access_key);
            let secret_key = overrides
                .secret_key
                .clone()
                .unwrap_or(persisted.secret_key);
            if access_key.trim().is_empty() || secret_key.trim().is_empty() {
                CredentialSource::Missing
            } else {
                CredentialSource::Static {
                    access_key,
                    secret_key,
                }
            }
        };

        let cache_control = persisted.cache_control_header.trim();

        Ok(ResolvedConfig {
            credentials,
            bucket,
            region,
            use_cname: persisted.use_cname,
            domain: persisted.domain.trim().to_string(),
            use_customhost: persisted.use_customhost,
            hostname: persisted.hostname.trim().to_string(),
            cache_control_header: (!cache_control.is_empty()).then(|| cache_control.to_string()),
            encryption,
            root_folder: normalize_root_folder(&persisted.root_folder),
            use_https: persisted.use_https,
            ignore_cache: persisted.ignore_cache,
            use_s3_for_public: persisted.use_s3_for_public,
            use_s3_for_private: persisted.use_s3_for_private,
            no_rewrite_cssjs: persisted.no_rewrite_cssjs,
            presigned_urls: persisted.presigned_urls,
            saveas: persisted.saveas,
            torrents: persisted.torrents,
        })
    }
}

/// Strips slashes (either kind) from both ends of a root folder.
pub fn normalize_root_folder(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '/' || c == '\\')
        .to_string()
}

fn resolve_region(raw: &str) -> S3fsResult<String> {
    let region = raw.trim();
    if region.is_empty() {
        return Ok(DEFAULT_REGION.to_string());
    }
    if SUPPORTED_REGIONS.contains(&region) {
        Ok(region.to_string())
    } else {
        Err(S3fsError::Configuration(format!(
            "unrecognized region {region:?}"
        )))
    }
}

fn has_rules(list: &str) -> bool {
    list.lines().any(|line| !line.trim().is_empty())
}
