//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for remote identity. Each newtype ensures data
//! validity at construction time so the rest of the engine can assume
//! well-formed values.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::SyncError;

// ============================================================================
// RemoteId
// ============================================================================

/// Provider-assigned identifier for a remote item
///
/// Opaque to the engine; only the remote adapter interprets it. Must be
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Creates a new `RemoteId`, rejecting empty values
    pub fn new(id: impl Into<String>) -> Result<Self, SyncError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SyncError::InvalidTask("remote ID must not be empty".into()));
        }
        Ok(Self(id))
    }

    /// Returns the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RemotePath
// ============================================================================

/// Absolute, `/`-separated path of an item on the remote drive
///
/// Always starts with `/`; the drive root is `/`. Trailing slashes are
/// normalized away (except for the root itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotePath(String);

impl RemotePath {
    /// Creates a new `RemotePath` from an absolute path string
    pub fn new(path: impl Into<String>) -> Result<Self, SyncError> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(SyncError::InvalidTask(format!(
                "remote path must be absolute: '{path}'"
            )));
        }
        if path == "/" {
            return Ok(Self(path));
        }
        Ok(Self(path.trim_end_matches('/').to_string()))
    }

    /// The drive root (`/`)
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the drive root
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Appends one child name to this path
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self(format!("/{name}"))
        } else {
            Self(format!("{}/{name}", self.0))
        }
    }

    /// Returns the last path segment, or `None` for the root
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Returns the enclosing path, or `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Returns this path relative to `root`, without a leading slash.
    ///
    /// Returns `None` when the path is not under `root`. The root relative
    /// to itself is the empty string.
    pub fn relative_to(&self, root: &RemotePath) -> Option<&str> {
        if root.is_root() {
            return Some(self.0.trim_start_matches('/'));
        }
        if self.0 == root.0 {
            return Some("");
        }
        self.0
            .strip_prefix(&root.0)
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
