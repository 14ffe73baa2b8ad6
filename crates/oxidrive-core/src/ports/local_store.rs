//! Local store port (driven/secondary port)
//!
//! Interface for mutations and content verification on the local
//! filesystem. Read-side traversal (directory listing, metadata) is done
//! directly by the tasks; everything that writes, and everything whose
//! behavior changes in dry-run mode, goes through this port.
//!
//! The match algorithm lives behind [`LocalStore::verify_match`] because
//! its read-only implementation is what makes dry-run inert: it reports
//! every file pair as [`FileMatch::Exact`], so no transfer is ever queued.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::errors::SyncError;
use crate::domain::node::NodeHashes;

// ============================================================================
// FileMatch
// ============================================================================

/// Outcome of comparing one local file to one remote file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMatch {
    /// Content and timestamps agree; nothing to do
    Exact,
    /// Content agrees but timestamps differ; update properties only
    ContentOnly,
    /// Content differs (or cannot be proven equal); re-transfer
    Mismatch,
}

// ============================================================================
// LocalStore trait
// ============================================================================

/// Port trait for local filesystem mutations and verification
#[async_trait::async_trait]
pub trait LocalStore: Send + Sync {
    /// Deletes a file, or a directory with its entire subtree
    async fn delete(&self, path: &Path) -> Result<(), SyncError>;

    /// Creates a subdirectory under `parent` and returns its path
    async fn create_folder(&self, parent: &Path, name: &str) -> Result<PathBuf, SyncError>;

    /// Creates an empty file under `parent` and returns its path
    async fn create_file(&self, parent: &Path, name: &str) -> Result<PathBuf, SyncError>;

    /// Atomically replaces `original` with `replacement` (rename on the
    /// same filesystem); `original` need not exist yet
    async fn replace_file(&self, original: &Path, replacement: &Path) -> Result<(), SyncError>;

    /// Applies remote timestamps to a local file.
    ///
    /// Returns true if anything changed. Creation time is
    /// filesystem-managed on most platforms and is used for comparison
    /// only; the modification time is what gets written.
    async fn set_attributes(
        &self,
        path: &Path,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Result<bool, SyncError>;

    /// Checks a file's content against a CRC32 checksum
    async fn verify_crc(&self, path: &Path, expected: u32) -> Result<bool, SyncError>;

    /// Checks a file's content against a hex SHA-1 digest
    async fn verify_sha1(&self, path: &Path, expected: &str) -> Result<bool, SyncError>;

    /// Runs the match algorithm for one local/remote file pair.
    ///
    /// `size`, `created` and `modified` describe the remote side; remote
    /// timestamps are rounded down to whole seconds before comparison.
    /// `force_hash` behavior is an implementation property (see the
    /// read-write adapter).
    async fn verify_match(
        &self,
        path: &Path,
        hashes: Option<&NodeHashes>,
        size: u64,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Result<FileMatch, SyncError>;

    /// Computes the CRC32 checksum of a file
    async fn crc32(&self, path: &Path) -> Result<u32, SyncError>;

    /// Computes the hex SHA-1 digest of a file
    async fn sha1(&self, path: &Path) -> Result<String, SyncError>;
}
