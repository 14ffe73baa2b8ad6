//! DeleteTask - removes one item from exactly one side
//!
//! Local deletion is recursive over the whole subtree; remote deletion is
//! a single call that cascades server-side. Deletes carry the highest
//! priority so obsolete entries disappear before the tree exploration
//! fans out further.

use tracing::info;

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};

use crate::task::TaskContext;

pub(crate) const PRIORITY: u8 = 100;

enum DeleteTarget {
    Remote(RemoteNode),
    Local(LocalNode),
}

/// Deletes one file or subtree on one side of the sync
pub struct DeleteTask {
    target: DeleteTarget,
}

impl DeleteTask {
    /// Deletes a remote item (folder deletion cascades server-side)
    pub(crate) fn remote(node: RemoteNode) -> Self {
        Self {
            target: DeleteTarget::Remote(node),
        }
    }

    /// Deletes a local file or directory subtree
    pub(crate) fn local(node: LocalNode) -> Self {
        Self {
            target: DeleteTarget::Local(node),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match &self.target {
            DeleteTarget::Remote(node) => format!("delete remote {}", node.path),
            DeleteTarget::Local(node) => format!("delete local {}", node.path().display()),
        }
    }

    pub(crate) async fn execute(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        match &self.target {
            DeleteTarget::Remote(node) => {
                ctx.api.delete(node).await?;
                ctx.reporter.remote_deleted();
                info!(path = %node.path, "deleted remote item");
            }
            DeleteTarget::Local(node) => {
                ctx.store.delete(node.path()).await?;
                ctx.reporter.local_deleted();
                info!(path = %node.path().display(), "deleted local item");
            }
        }
        Ok(())
    }
}
