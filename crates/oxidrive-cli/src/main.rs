//! Oxidrive CLI - one-way directory synchronization with a cloud drive
//!
//! Wires configuration, logging, the REST client, and the sync engine
//! together: load config, apply flag overrides, resolve and validate both
//! roots, seed the scheduler, run the worker pool to completion, and emit
//! the aggregate summary.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::Parser;
use humansize::{format_size, BINARY};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use oxidrive_client::{DriveClient, ReadOnlyDrive};
use oxidrive_core::config::{Config, SyncDirection};
use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::local_store::LocalStore;
use oxidrive_core::ports::remote_drive::RemoteDrive;
use oxidrive_sync::store::{ReadOnlyLocalStore, RwLocalStore};
use oxidrive_sync::{SyncEngine, SyncOptions};

#[derive(Debug, Parser)]
#[command(
    name = "oxidrive",
    version,
    about = "One-way synchronization between a local directory and a cloud drive"
)]
struct Cli {
    /// Local directory to synchronize
    #[arg(long)]
    local: Option<PathBuf>,

    /// Remote folder to synchronize (absolute remote path, e.g. /Backup)
    #[arg(long)]
    remote: Option<String>,

    /// Direction of the sync: "up" pushes local changes, "down" pulls
    /// remote changes
    #[arg(long)]
    direction: Option<SyncDirection>,

    /// Do not descend into subdirectories
    #[arg(long)]
    no_recurse: bool,

    /// Report what would change without modifying either side
    #[arg(long)]
    dry_run: bool,

    /// Number of parallel sync workers
    #[arg(long)]
    threads: Option<usize>,

    /// Attempts per task before it is recorded as a permanent failure
    #[arg(long)]
    tries: Option<u32>,

    /// Skip files larger than this many KiB
    #[arg(long)]
    max_size: Option<u64>,

    /// Glob pattern for names or relative paths to skip (repeatable)
    #[arg(long = "ignore")]
    ignored: Vec<String>,

    /// Upload files above this many MiB through a resumable chunked session
    #[arg(long)]
    split_after: Option<u64>,

    /// Always compare content hashes, even when size and timestamps match
    #[arg(long)]
    use_hash: bool,

    /// Write log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Use an alternate configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bearer token for the drive API (defaults to $OXIDRIVE_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Base URL of the drive API
    #[arg(long)]
    base_url: Option<String>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Applies command-line flags on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(local) = &cli.local {
        config.sync.local_root = local.clone();
    }
    if let Some(remote) = &cli.remote {
        config.sync.remote_root = remote.clone();
    }
    if let Some(direction) = cli.direction {
        config.sync.direction = direction;
    }
    if cli.no_recurse {
        config.sync.recursive = false;
    }
    if cli.dry_run {
        config.sync.dry_run = true;
    }
    if let Some(threads) = cli.threads {
        config.sync.workers = threads;
    }
    if let Some(tries) = cli.tries {
        config.sync.max_tries = tries;
    }
    if let Some(max_size) = cli.max_size {
        config.filters.max_size_kb = max_size;
    }
    if !cli.ignored.is_empty() {
        config.filters.ignored.extend(cli.ignored.iter().cloned());
    }
    if let Some(split_after) = cli.split_after {
        config.transfers.split_after_mb = split_after;
    }
    if cli.use_hash {
        config.sync.force_hash = true;
    }
    if let Some(token) = &cli.token {
        config.api.access_token = Some(token.clone());
    }
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(log_file) = &cli.log_file {
        config.logging.file = Some(log_file.clone());
    }
}

/// Sets up tracing output per verbosity and optional log file
fn init_tracing(config: &Config, verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("unable to open log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path);
    apply_overrides(&mut config, &cli);

    init_tracing(&config, cli.verbose)?;

    if config.sync.local_root.as_os_str().is_empty() {
        bail!("must specify --local (or sync.local_root in the config file)");
    }
    if config.sync.remote_root.is_empty() {
        bail!("must specify --remote (or sync.remote_root in the config file)");
    }

    let token = config
        .api
        .access_token
        .clone()
        .or_else(|| std::env::var("OXIDRIVE_TOKEN").ok())
        .context("no API token: pass --token, set OXIDRIVE_TOKEN, or configure api.access_token")?;

    let client = DriveClient::with_base_url(token, &config.api.base_url)
        .with_chunk_size(config.chunk_size_bytes());

    // Dry-run decorates both sides read-only so the whole engine runs
    // without modifying anything.
    let (api, store): (Arc<dyn RemoteDrive>, Arc<dyn LocalStore>) = if config.sync.dry_run {
        warn!("this is a dry run - no changes will be made");
        (
            Arc::new(ReadOnlyDrive::new(client)),
            Arc::new(ReadOnlyLocalStore),
        )
    } else {
        (
            Arc::new(client),
            Arc::new(RwLocalStore::new(config.sync.force_hash)),
        )
    };

    match api.get_quota().await {
        Ok(quota) if quota.total > 0 => info!(
            "Using drive: {} of {} in use ({:.1}%)",
            format_size(quota.used, BINARY),
            format_size(quota.total, BINARY),
            (quota.used as f64 / quota.total as f64) * 100.0
        ),
        Ok(_) => {}
        Err(err) => warn!(%err, "unable to fetch drive quota"),
    }

    // Resolve and validate the remote root.
    let remote_root_path = RemotePath::new(config.sync.remote_root.clone())
        .context("invalid remote root path")?;
    let remote_root = match api.get_by_path(&remote_root_path).await {
        Ok(node) => node,
        Err(err) if err.status() == Some(404) => {
            bail!("remote folder '{remote_root_path}' does not exist");
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("unable to locate remote folder '{remote_root_path}'")
            });
        }
    };
    if !remote_root.is_directory {
        bail!("remote root '{remote_root_path}' is not a folder");
    }

    // Validate the local root.
    if !config.sync.local_root.is_dir() {
        bail!(
            "local path '{}' is not a valid directory",
            config.sync.local_root.display()
        );
    }

    info!(root = %remote_root.path, "starting at remote folder");

    let options = SyncOptions::from_config(&config)?;
    let engine = SyncEngine::new(api, store, options);
    let report = engine
        .run(remote_root, &config.sync.local_root)
        .await
        .context("synchronization failed")?;

    engine.reporter().report();

    if report.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
