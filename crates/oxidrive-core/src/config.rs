//! Configuration module for Oxidrive.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, and defaults. Command-line flags are
//! applied on top of the loaded file by the CLI crate.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::SyncError;

// ----------------------------------------------------------------------------
// SyncDirection
// ----------------------------------------------------------------------------

/// Direction of the synchronization, fixed for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Push: the local tree is authoritative, the remote is made to match
    Up,
    /// Pull: the remote tree is authoritative, the local copy is made to match
    Down,
}

impl FromStr for SyncDirection {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(SyncError::InvalidTask(format!(
                "unknown sync direction '{other}' (expected 'up' or 'down')"
            ))),
        }
    }
}

impl Display for SyncDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

// ----------------------------------------------------------------------------
// Config struct with sub-sections
// ----------------------------------------------------------------------------

/// Top-level configuration for Oxidrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncSettings,
    pub transfers: TransferSettings,
    pub filters: FilterSettings,
    pub api: ApiSettings,
    pub logging: LoggingSettings,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Root directory of the local tree.
    pub local_root: PathBuf,
    /// Root folder on the remote drive (absolute remote path).
    pub remote_root: String,
    /// Direction of the run.
    pub direction: SyncDirection,
    /// Whether to descend into subdirectories.
    pub recursive: bool,
    /// Report what would change without modifying either side.
    pub dry_run: bool,
    /// Number of parallel sync workers.
    pub workers: usize,
    /// Attempts per task before it is recorded as a permanent failure.
    pub max_tries: u32,
    /// Always compare content hashes, even when size and timestamps match.
    pub force_hash: bool,
}

/// File transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Uploads above this size (in MiB) use a resumable chunked session.
    pub split_after_mb: u64,
    /// Size of each upload chunk (in MiB).
    pub chunk_size_mb: u64,
}

/// Path and size filtering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Files larger than this (in KiB) are skipped. 0 disables the limit.
    pub max_size_kb: u64,
    /// Glob patterns for names or relative paths to skip. Directory
    /// patterns may end with `/`.
    pub ignored: Vec<String>,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the drive REST API.
    pub base_url: String,
    /// Bearer token for the API. Usually supplied via the
    /// `OXIDRIVE_TOKEN` environment variable instead of the file.
    pub access_token: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/oxidrive/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("oxidrive")
            .join("config.yaml")
    }

    /// Upload chunking threshold in bytes.
    pub fn split_after_bytes(&self) -> u64 {
        self.transfers.split_after_mb * 1024 * 1024
    }

    /// Upload chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> u64 {
        self.transfers.chunk_size_mb * 1024 * 1024
    }
}

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            local_root: PathBuf::new(),
            remote_root: "/".to_string(),
            direction: SyncDirection::Down,
            recursive: true,
            dry_run: false,
            workers: 5,
            max_tries: 3,
            force_hash: false,
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            split_after_mb: 4,
            chunk_size_mb: 10,
        }
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            max_size_kb: 0,
            ignored: Vec::new(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.onedrive.com/v1.0".to_string(),
            access_token: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
