//! UpdatePropertiesTask - copies timestamps without transferring content
//!
//! Queued when the match algorithm finds equal content with drifted
//! timestamps. Direction decides which side gets written: UP patches the
//! remote item's metadata from the local file, DOWN applies the remote
//! timestamps to the local file.

use tracing::info;

use oxidrive_core::config::SyncDirection;
use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};

use crate::task::TaskContext;

pub(crate) const PRIORITY: u8 = 50;

/// Timestamps-only update for one matching file pair
pub struct UpdatePropertiesTask {
    remote: RemoteNode,
    local: LocalNode,
}

impl UpdatePropertiesTask {
    pub(crate) fn new(remote: RemoteNode, local: LocalNode) -> Self {
        Self { remote, local }
    }

    pub(crate) fn describe(&self) -> String {
        format!("update properties of {}", self.remote.path)
    }

    pub(crate) async fn execute(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        match ctx.options.direction {
            SyncDirection::Up => {
                let created = self.local.created()?;
                let modified = self.local.modified()?;
                ctx.api
                    .set_properties(&self.remote, created, modified)
                    .await?;
            }
            SyncDirection::Down => {
                ctx.store
                    .set_attributes(self.local.path(), self.remote.created, self.remote.modified)
                    .await?;
            }
        }
        ctx.reporter.properties_updated();
        info!(path = %self.remote.path, "updated timestamps");
        Ok(())
    }
}
