//! Node snapshots for both sides of the sync
//!
//! [`RemoteNode`] is an immutable snapshot taken from a listing call; it
//! carries its parent as a path lookup key, never as an owning link, and
//! must not be assumed to outlive the listing that produced it.
//!
//! [`LocalNode`] is deliberately thin: it wraps a path and answers every
//! metadata question by asking the filesystem at call time, so no local
//! state is ever cached across tasks.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{RemoteId, RemotePath};

// ============================================================================
// NodeHashes
// ============================================================================

/// Content hashes published by the remote service for a file
///
/// The service may publish either, both, or neither. Verification prefers
/// CRC32 and falls back to SHA-1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHashes {
    /// CRC32 of the file content
    pub crc32: Option<u32>,
    /// Lowercase hex SHA-1 of the file content
    pub sha1: Option<String>,
}

impl NodeHashes {
    /// Returns true if neither hash is available
    pub fn is_empty(&self) -> bool {
        self.crc32.is_none() && self.sha1.is_none()
    }
}

// ============================================================================
// RemoteNode
// ============================================================================

/// Immutable snapshot of one file or folder on the remote drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Provider-assigned identifier. Synthetic nodes fabricated in dry-run
    /// mode carry no identifier.
    pub id: Option<RemoteId>,
    /// Item name (last path segment; the drive root has an empty name)
    pub name: String,
    /// Full remote path of the item
    pub path: RemotePath,
    /// Whether the item is a folder
    pub is_directory: bool,
    /// Content size in bytes (0 for folders)
    pub size: u64,
    /// Content hashes, if the service published any (files only)
    pub hashes: Option<NodeHashes>,
    /// Creation timestamp as reported by the service
    pub created: Option<DateTime<Utc>>,
    /// Last modification timestamp as reported by the service
    pub modified: Option<DateTime<Utc>>,
    /// Path of the enclosing folder. A lookup key, not an owning link;
    /// `None` for the drive root.
    pub parent_path: Option<RemotePath>,
}

impl RemoteNode {
    /// Fabricates a folder node that was not returned by a listing call.
    ///
    /// Used by the dry-run remote adapter, which must hand back a plausible
    /// container for fan-out without actually creating anything.
    pub fn synthetic_folder(path: RemotePath) -> Self {
        let name = path.file_name().unwrap_or("").to_string();
        let parent_path = path.parent();
        Self {
            id: None,
            name,
            path,
            is_directory: true,
            size: 0,
            hashes: None,
            created: None,
            modified: None,
            parent_path,
        }
    }

    /// Fabricates a file node from local metadata, for dry-run uploads.
    pub fn synthetic_file(path: RemotePath, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        let name = path.file_name().unwrap_or("").to_string();
        let parent_path = path.parent();
        Self {
            id: None,
            name,
            path,
            is_directory: false,
            size,
            hashes: None,
            created: modified,
            modified,
            parent_path,
        }
    }

    /// Returns a container reference for this node's parent, synthesized
    /// from the parent path lookup key.
    ///
    /// The result carries no identifier; adapters address it by path.
    pub fn parent_ref(&self) -> Option<RemoteNode> {
        self.parent_path
            .clone()
            .map(RemoteNode::synthetic_folder)
    }

    /// Returns true if the item is a regular file
    pub fn is_file(&self) -> bool {
        !self.is_directory
    }
}

// ============================================================================
// LocalNode
// ============================================================================

/// One file or directory on the local filesystem
///
/// All accessors stat the filesystem live; nothing is cached, so a node
/// held across a queue round-trip always reflects current disk state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNode {
    path: PathBuf,
}

impl LocalNode {
    /// Wraps a local path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the wrapped path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file name, lossily decoded
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Returns true if the path currently exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns true if the path is currently a directory
    pub fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    /// Returns true if the path is currently a regular file
    pub fn is_file(&self) -> bool {
        self.path.is_file()
    }

    /// Returns the current size in bytes
    pub fn size(&self) -> std::io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Returns the current modification time, truncated to whole seconds
    pub fn modified(&self) -> std::io::Result<Option<DateTime<Utc>>> {
        let meta = std::fs::metadata(&self.path)?;
        Ok(meta.modified().ok().and_then(to_whole_seconds))
    }

    /// Returns the creation time, truncated to whole seconds.
    ///
    /// Many Linux filesystems do not expose a birth time; `None` then.
    pub fn created(&self) -> std::io::Result<Option<DateTime<Utc>>> {
        let meta = std::fs::metadata(&self.path)?;
        Ok(meta.created().ok().and_then(to_whole_seconds))
    }
}

/// Converts a `SystemTime` to UTC, truncated to whole seconds
fn to_whole_seconds(time: std::time::SystemTime) -> Option<DateTime<Utc>> {
    let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
    DateTime::from_timestamp(secs as i64, 0)
}
