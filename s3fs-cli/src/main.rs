//! `s3fs-cli`: copy local file trees into the bucket and inspect delivery rules.
//!
//! Settings come from a JSON file using the persisted s3fs keys; the access
//! and secret keys may be overridden through `S3FS_ACCESS_KEY` and
//! `S3FS_SECRET_KEY`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use s3fs_sync::delivery::DeliveryUrls;
use s3fs_sync::{
    CancelToken, ConfigResolver, EnvironmentOverrides, FileScheme, PathPolicyMatcher, Policy,
    ResolvedConfig, S3fsSettings, S3fsSync, SchemeRoots, StorageClientFactory,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "s3fs-cli", version, about = "Sync local s3fs file trees into S3")]
struct Cli {
    /// JSON settings file.
    #[arg(long)]
    settings: PathBuf,

    /// Local directory backing public://.
    #[arg(long)]
    public_root: Option<PathBuf>,

    /// Local directory backing private://.
    #[arg(long)]
    private_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy every local file of a scheme into the bucket.
    Sync {
        /// `public` or `private`.
        scheme: FileScheme,

        /// Maximum concurrent uploads.
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
    /// Print the delivery policy chosen for a path.
    Match {
        /// Path relative to the scheme root, e.g. `private_files/report.pdf`.
        path: String,

        /// Scheme the path belongs to. Private paths never get torrents.
        #[arg(long, default_value = "public")]
        scheme: FileScheme,

        /// Also build the delivery URL (signs presigned and save-as URLs).
        #[arg(long)]
        url: bool,
    },
}

#[derive(Debug, Serialize)]
struct MatchOutput<'a> {
    path: &'a str,
    #[serde(flatten)]
    policy: Policy,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    skipped_rules: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli)?);
    let factory = Arc::new(StorageClientFactory::new());

    match cli.command {
        Command::Sync {
            scheme,
            concurrency,
        } => {
            let roots = SchemeRoots {
                public: cli.public_root,
                private: cli.private_root,
            };
            run_sync(config, factory, roots, scheme, concurrency).await
        }
        Command::Match { path, scheme, url } => {
            run_match(config, &factory, &path, scheme, url).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ResolvedConfig> {
    let settings = S3fsSettings::load(&cli.settings)
        .with_context(|| format!("failed to read settings from {}", cli.settings.display()))?;
    let config = ConfigResolver::resolve(settings, &EnvironmentOverrides::from_env())?;
    Ok(config)
}

async fn run_sync(
    config: Arc<ResolvedConfig>,
    factory: Arc<StorageClientFactory>,
    roots: SchemeRoots,
    scheme: FileScheme,
    concurrency: usize,
) -> Result<ExitCode> {
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, waiting for in-flight uploads");
            on_interrupt.cancel();
        }
    });

    let sync = S3fsSync::new(config, factory, roots).with_concurrency(concurrency);
    let report = sync.copy_local_tree_to_store(scheme, &cancel).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_complete_success() {
        info!("{scheme}:// sync complete");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run_match(
    config: Arc<ResolvedConfig>,
    factory: &StorageClientFactory,
    path: &str,
    scheme: FileScheme,
    with_url: bool,
) -> Result<()> {
    let matcher = PathPolicyMatcher::from_config(&config);
    let policy = matcher.evaluate_with_privacy(path, |_| scheme == FileScheme::Private);

    let url = if with_url {
        let key = object_key(&config, scheme, path);
        let client = factory.client_for(&config).await?;
        Some(
            DeliveryUrls::new(Arc::clone(&config))
                .url_for(&key, policy, &client)
                .await?,
        )
    } else {
        None
    };

    let output = MatchOutput {
        path,
        policy,
        url,
        skipped_rules: matcher.diagnostics().iter().map(ToString::to_string).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn object_key(config: &ResolvedConfig, scheme: FileScheme, path: &str) -> String {
    format!(
        "{}/{}",
        config.destination_prefix(scheme),
        path.trim_start_matches('/')
    )
}
