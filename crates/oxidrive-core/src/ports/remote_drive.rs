//! Remote drive port (driven/secondary port)
//!
//! Interface for interacting with the remote hierarchical storage service.
//! The primary implementation talks to a OneDrive-style REST API, but the
//! trait is deliberately provider-agnostic.
//!
//! ## Design Notes
//!
//! - Methods return [`SyncError`] directly so the task retry policy can
//!   classify failures by HTTP status without string matching.
//! - [`UploadSession`] is the mutable state of one resumable upload; the
//!   caller owns it and drives it chunk by chunk through
//!   [`RemoteDrive::upload_chunk`], which lets chunk failures be retried
//!   locally without restarting the session.
//! - Implementations must not retry internally; transparent retry is the
//!   task engine's job.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::errors::SyncError;
use crate::domain::node::{LocalNode, RemoteNode};
use crate::domain::newtypes::RemotePath;

// ============================================================================
// UploadSession
// ============================================================================

/// State of one resumable chunked upload
///
/// Created by [`RemoteDrive::start_upload_session`]; each successful
/// [`RemoteDrive::upload_chunk`] call advances `offset`. The session is
/// complete once the service has acknowledged the final chunk and returned
/// the resulting item.
#[derive(Debug)]
pub struct UploadSession {
    /// Absolute URL the chunks are PUT to
    pub upload_url: String,
    /// Path of the local file being uploaded
    pub local_path: PathBuf,
    /// Total file size in bytes
    pub total_size: u64,
    /// Bytes acknowledged so far; the next chunk starts here
    pub offset: u64,
    /// Size of each chunk in bytes
    pub chunk_size: u64,
    /// Size of the most recently acknowledged chunk
    pub last_uploaded: u64,
    /// The created item, present once the final chunk was accepted
    pub result: Option<RemoteNode>,
}

impl UploadSession {
    /// Returns true once the service has acknowledged the whole file
    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    /// Bytes acknowledged so far
    pub fn total_uploaded(&self) -> u64 {
        self.offset
    }

    /// Fraction of the file acknowledged so far, in percent
    pub fn progress_percent(&self) -> f64 {
        if self.total_size == 0 {
            100.0
        } else {
            (self.offset as f64 / self.total_size as f64) * 100.0
        }
    }
}

// ============================================================================
// DriveQuota
// ============================================================================

/// Storage quota of the remote drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveQuota {
    /// Bytes in use
    pub used: u64,
    /// Total bytes available
    pub total: u64,
}

// ============================================================================
// RemoteDrive trait
// ============================================================================

/// Port trait for remote storage operations
#[async_trait::async_trait]
pub trait RemoteDrive: Send + Sync {
    /// Fetches the drive root folder
    async fn get_root(&self) -> Result<RemoteNode, SyncError>;

    /// Looks up an item by its absolute remote path
    async fn get_by_path(&self, path: &RemotePath) -> Result<RemoteNode, SyncError>;

    /// Lists the direct children of a folder (one logical call; paging is
    /// the adapter's concern)
    async fn get_children(&self, node: &RemoteNode) -> Result<Vec<RemoteNode>, SyncError>;

    /// Creates a subfolder under `parent` and returns it
    async fn create_folder(&self, parent: &RemoteNode, name: &str)
        -> Result<RemoteNode, SyncError>;

    /// Uploads a new file under `parent` in a single request
    async fn upload_file(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<RemoteNode, SyncError>;

    /// Replaces an existing file under `parent` in a single request
    async fn replace_file(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<RemoteNode, SyncError>;

    /// Opens a resumable upload session for a large file
    async fn start_upload_session(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<UploadSession, SyncError>;

    /// Uploads the next chunk of an open session.
    ///
    /// On success the session's `offset` advances; on the final chunk the
    /// session's `result` is populated. On failure the session is left
    /// unchanged so the same chunk can be retried.
    async fn upload_chunk(&self, session: &mut UploadSession) -> Result<(), SyncError>;

    /// Downloads a file's content into `dest` (an existing local file,
    /// typically a temporary one)
    async fn download(&self, node: &RemoteNode, dest: &Path) -> Result<(), SyncError>;

    /// Deletes an item. Folder deletion cascades server-side.
    async fn delete(&self, node: &RemoteNode) -> Result<(), SyncError>;

    /// Updates an item's created/modified timestamps without touching content
    async fn set_properties(
        &self,
        node: &RemoteNode,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Result<(), SyncError>;

    /// Fetches the drive's storage quota
    async fn get_quota(&self) -> Result<DriveQuota, SyncError>;
}
