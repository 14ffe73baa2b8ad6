//! Local filesystem adapters (driven/secondary adapters)
//!
//! Two implementations of the [`LocalStore`] port:
//!
//! - [`RwLocalStore`] - the real thing: recursive deletion, atomic
//!   temp-then-rename replacement, timestamp application, CRC32/SHA-1
//!   hashing, and the match algorithm
//! - [`ReadOnlyLocalStore`] - the dry-run variant: every mutation is a
//!   no-op, every verification succeeds, and the match algorithm is
//!   bypassed entirely (always [`FileMatch::Exact`]) so no transfers are
//!   ever queued
//!
//! ## Match algorithm
//!
//! 1. Remote created/modified timestamps are rounded down to whole
//!    seconds (the service may carry sub-second precision the local store
//!    lacks); local timestamps are read at the same precision.
//! 2. Fast path: unless hash verification is forced, equal size and equal
//!    timestamps mean [`FileMatch::Exact`] without reading content.
//! 3. Otherwise content hashes are compared - CRC32 preferred, SHA-1 as
//!    fallback; a remote file publishing neither is treated as
//!    [`FileMatch::Mismatch`], forcing a re-transfer.
//! 4. Equal hash with unequal timestamps is [`FileMatch::ContentOnly`].

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use tracing::debug;

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::NodeHashes;
use oxidrive_core::ports::local_store::{FileMatch, LocalStore};

// ============================================================================
// Hashing helpers
// ============================================================================

const HASH_BUF_SIZE: usize = 64 * 1024;

/// Streams a file through the CRC32 hasher on a blocking thread
async fn compute_crc32(path: &Path) -> Result<u32, SyncError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<u32, SyncError> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = crc32fast::Hasher::new();
        let mut buf = [0u8; HASH_BUF_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    })
    .await
    .map_err(|err| SyncError::Other(format!("hashing task failed: {err}")))?
}

/// Streams a file through SHA-1 on a blocking thread, returning lowercase hex
async fn compute_sha1(path: &Path) -> Result<String, SyncError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<String, SyncError> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha1::new();
        let mut buf = [0u8; HASH_BUF_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let digest = hasher.finalize();
        Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
    })
    .await
    .map_err(|err| SyncError::Other(format!("hashing task failed: {err}")))?
}

/// Rounds a timestamp down to whole seconds
fn round_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

/// Converts a `SystemTime` to UTC, truncated to whole seconds
fn system_time_to_seconds(time: std::time::SystemTime) -> Option<DateTime<Utc>> {
    let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
    DateTime::from_timestamp(secs as i64, 0)
}

// ============================================================================
// RwLocalStore
// ============================================================================

/// Read-write local filesystem adapter
pub struct RwLocalStore {
    /// When set, the fast size+timestamp path is disabled and every match
    /// decision reads content
    force_hash: bool,
}

impl RwLocalStore {
    /// Creates the adapter; `force_hash` comes from configuration
    pub fn new(force_hash: bool) -> Self {
        Self { force_hash }
    }
}

#[async_trait::async_trait]
impl LocalStore for RwLocalStore {
    async fn delete(&self, path: &Path) -> Result<(), SyncError> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.is_dir() {
            debug!(path = %path.display(), "removing local directory recursively");
            tokio::fs::remove_dir_all(path).await?;
        } else {
            debug!(path = %path.display(), "removing local file");
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn create_folder(&self, parent: &Path, name: &str) -> Result<PathBuf, SyncError> {
        let path = parent.join(name);
        match tokio::fs::create_dir(&path).await {
            Ok(()) => Ok(path),
            // A retried task may find its own directory from the previous
            // attempt; that is not a failure.
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => {
                Ok(path)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn create_file(&self, parent: &Path, name: &str) -> Result<PathBuf, SyncError> {
        let path = parent.join(name);
        // Truncates a leftover file from a failed earlier attempt.
        tokio::fs::File::create(&path).await?;
        Ok(path)
    }

    async fn replace_file(&self, original: &Path, replacement: &Path) -> Result<(), SyncError> {
        debug!(
            from = %replacement.display(),
            to = %original.display(),
            "renaming temporary file into place"
        );
        tokio::fs::rename(replacement, original).await?;
        Ok(())
    }

    async fn set_attributes(
        &self,
        path: &Path,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Result<bool, SyncError> {
        let Some(target_modified) = modified.map(round_to_seconds) else {
            return Ok(false);
        };
        // Creation time is filesystem-managed on Linux; only the
        // modification time can be applied.
        let _ = created;

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<bool, SyncError> {
            let meta = std::fs::metadata(&path)?;
            let current = meta.modified().ok().and_then(system_time_to_seconds);
            if current == Some(target_modified) {
                return Ok(false);
            }

            let file_time = UNIX_EPOCH + Duration::from_secs(target_modified.timestamp() as u64);
            let file = std::fs::File::options().write(true).open(&path)?;
            file.set_times(
                std::fs::FileTimes::new()
                    .set_accessed(file_time)
                    .set_modified(file_time),
            )?;
            Ok(true)
        })
        .await
        .map_err(|err| SyncError::Other(format!("attribute task failed: {err}")))?
    }

    async fn verify_crc(&self, path: &Path, expected: u32) -> Result<bool, SyncError> {
        Ok(compute_crc32(path).await? == expected)
    }

    async fn verify_sha1(&self, path: &Path, expected: &str) -> Result<bool, SyncError> {
        Ok(compute_sha1(path).await?.eq_ignore_ascii_case(expected))
    }

    async fn verify_match(
        &self,
        path: &Path,
        hashes: Option<&NodeHashes>,
        size: u64,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Result<FileMatch, SyncError> {
        let meta = tokio::fs::metadata(path).await?;
        let local_size = meta.len();
        let local_modified = meta.modified().ok().and_then(system_time_to_seconds);
        let local_created = meta.created().ok().and_then(system_time_to_seconds);

        let remote_modified = modified.map(round_to_seconds);
        let remote_created = created.map(round_to_seconds);

        let size_matches = size == local_size;
        // An unknown remote timestamp can never prove equality; an
        // unavailable local creation time (most Linux filesystems) is not
        // held against the file.
        let modified_matches = match (remote_modified, local_modified) {
            (Some(remote), Some(local)) => remote == local,
            _ => false,
        };
        let created_matches = match (remote_created, local_created) {
            (Some(remote), Some(local)) => remote == local,
            _ => true,
        };

        if !self.force_hash && size_matches && modified_matches && created_matches {
            return Ok(FileMatch::Exact);
        }

        let hash_matches = match hashes {
            Some(NodeHashes {
                crc32: Some(crc), ..
            }) => compute_crc32(path).await? == *crc,
            Some(NodeHashes {
                sha1: Some(sha1), ..
            }) => compute_sha1(path).await?.eq_ignore_ascii_case(sha1),
            // No usable hash on the remote side: force a re-transfer.
            _ => return Ok(FileMatch::Mismatch),
        };

        if hash_matches && !(modified_matches && created_matches) {
            Ok(FileMatch::ContentOnly)
        } else if hash_matches {
            Ok(FileMatch::Exact)
        } else {
            Ok(FileMatch::Mismatch)
        }
    }

    async fn crc32(&self, path: &Path) -> Result<u32, SyncError> {
        compute_crc32(path).await
    }

    async fn sha1(&self, path: &Path) -> Result<String, SyncError> {
        compute_sha1(path).await
    }
}

// ============================================================================
// ReadOnlyLocalStore
// ============================================================================

/// Dry-run local filesystem adapter: all mutations are inert
pub struct ReadOnlyLocalStore;

#[async_trait::async_trait]
impl LocalStore for ReadOnlyLocalStore {
    async fn delete(&self, path: &Path) -> Result<(), SyncError> {
        debug!(path = %path.display(), "dry-run: skipping local delete");
        Ok(())
    }

    async fn create_folder(&self, parent: &Path, name: &str) -> Result<PathBuf, SyncError> {
        debug!(parent = %parent.display(), name, "dry-run: skipping folder creation");
        Ok(parent.join(name))
    }

    async fn create_file(&self, parent: &Path, name: &str) -> Result<PathBuf, SyncError> {
        Ok(parent.join(name))
    }

    async fn replace_file(&self, _original: &Path, _replacement: &Path) -> Result<(), SyncError> {
        Ok(())
    }

    async fn set_attributes(
        &self,
        _path: &Path,
        _created: Option<DateTime<Utc>>,
        _modified: Option<DateTime<Utc>>,
    ) -> Result<bool, SyncError> {
        Ok(false)
    }

    async fn verify_crc(&self, _path: &Path, _expected: u32) -> Result<bool, SyncError> {
        Ok(true)
    }

    async fn verify_sha1(&self, _path: &Path, _expected: &str) -> Result<bool, SyncError> {
        Ok(true)
    }

    async fn verify_match(
        &self,
        _path: &Path,
        _hashes: Option<&NodeHashes>,
        _size: u64,
        _created: Option<DateTime<Utc>>,
        _modified: Option<DateTime<Utc>>,
    ) -> Result<FileMatch, SyncError> {
        // Dry-run never queues a transfer for an existing pair.
        Ok(FileMatch::Exact)
    }

    async fn crc32(&self, path: &Path) -> Result<u32, SyncError> {
        compute_crc32(path).await
    }

    async fn sha1(&self, path: &Path) -> Result<String, SyncError> {
        compute_sha1(path).await
    }
}
