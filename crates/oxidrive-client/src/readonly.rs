//! Read-only decorator for dry-run mode
//!
//! Wraps any [`RemoteDrive`] implementation: reads pass through, every
//! mutation is a no-op that logs what it would have done and hands back a
//! plausible synthetic node, so the rest of the engine (fan-out included)
//! runs unchanged without touching the remote side.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};
use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::remote_drive::{DriveQuota, RemoteDrive, UploadSession};

/// Mutation-free decorator around a real drive
pub struct ReadOnlyDrive<P> {
    inner: P,
}

impl<P> ReadOnlyDrive<P> {
    /// Wraps a drive, making every mutation inert
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl<P: RemoteDrive> RemoteDrive for ReadOnlyDrive<P> {
    async fn get_root(&self) -> Result<RemoteNode, SyncError> {
        self.inner.get_root().await
    }

    async fn get_by_path(&self, path: &RemotePath) -> Result<RemoteNode, SyncError> {
        self.inner.get_by_path(path).await
    }

    async fn get_children(&self, node: &RemoteNode) -> Result<Vec<RemoteNode>, SyncError> {
        self.inner.get_children(node).await
    }

    async fn create_folder(
        &self,
        parent: &RemoteNode,
        name: &str,
    ) -> Result<RemoteNode, SyncError> {
        debug!(parent = %parent.path, name, "dry-run: skipping remote folder creation");
        Ok(RemoteNode::synthetic_folder(parent.path.join(name)))
    }

    async fn upload_file(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<RemoteNode, SyncError> {
        debug!(parent = %parent.path, name = %file.name(), "dry-run: skipping upload");
        Ok(RemoteNode::synthetic_file(
            parent.path.join(&file.name()),
            file.size()?,
            file.modified()?,
        ))
    }

    async fn replace_file(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<RemoteNode, SyncError> {
        debug!(parent = %parent.path, name = %file.name(), "dry-run: skipping replace");
        Ok(RemoteNode::synthetic_file(
            parent.path.join(&file.name()),
            file.size()?,
            file.modified()?,
        ))
    }

    async fn start_upload_session(
        &self,
        parent: &RemoteNode,
        file: &LocalNode,
    ) -> Result<UploadSession, SyncError> {
        debug!(parent = %parent.path, name = %file.name(), "dry-run: skipping chunked upload");
        let size = file.size()?;
        // A session that is already complete: the chunk loop never runs.
        Ok(UploadSession {
            upload_url: String::new(),
            local_path: file.path().to_path_buf(),
            total_size: size,
            offset: size,
            chunk_size: size.max(1),
            last_uploaded: 0,
            result: Some(RemoteNode::synthetic_file(
                parent.path.join(&file.name()),
                size,
                file.modified()?,
            )),
        })
    }

    async fn upload_chunk(&self, _session: &mut UploadSession) -> Result<(), SyncError> {
        Ok(())
    }

    async fn download(&self, node: &RemoteNode, _dest: &Path) -> Result<(), SyncError> {
        debug!(path = %node.path, "dry-run: skipping download");
        Ok(())
    }

    async fn delete(&self, node: &RemoteNode) -> Result<(), SyncError> {
        debug!(path = %node.path, "dry-run: skipping remote delete");
        Ok(())
    }

    async fn set_properties(
        &self,
        node: &RemoteNode,
        _created: Option<DateTime<Utc>>,
        _modified: Option<DateTime<Utc>>,
    ) -> Result<(), SyncError> {
        debug!(path = %node.path, "dry-run: skipping property update");
        Ok(())
    }

    async fn get_quota(&self) -> Result<DriveQuota, SyncError> {
        self.inner.get_quota().await
    }
}
