//! DownloadTask - pulls one remote file or folder into the local tree
//!
//! A folder download creates the local directory and fans out one child
//! task per remote entry. A file download goes through a temporary file
//! that is verified (CRC32 preferred, SHA-1 fallback), stamped with the
//! remote timestamps, and only then renamed over the destination, so a
//! failed or partial transfer never corrupts the previous good copy.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::RemoteNode;
use oxidrive_core::domain::newtypes::RemotePath;

use crate::task::{Task, TaskContext};

/// Decided transfers run ahead of further tree exploration
pub(crate) const PRIORITY: u8 = 50;

/// Downloads one remote node into a local parent directory
pub struct DownloadTask {
    parent: PathBuf,
    remote_root: RemotePath,
    remote: RemoteNode,
    replace: bool,
}

impl DownloadTask {
    /// Fails immediately if the destination parent exists and is not a
    /// directory. A parent that does not exist yet is accepted: dry-run
    /// mode fabricates folders without touching disk.
    pub(crate) fn new(
        parent: PathBuf,
        remote_root: RemotePath,
        remote: RemoteNode,
        replace: bool,
    ) -> Result<Self, SyncError> {
        if parent.exists() && !parent.is_dir() {
            return Err(SyncError::InvalidTask(format!(
                "download parent '{}' is not a directory",
                parent.display()
            )));
        }
        Ok(Self {
            parent,
            remote_root,
            remote,
            replace,
        })
    }

    pub(crate) fn describe(&self) -> String {
        format!("download {}", self.remote.path)
    }

    pub(crate) async fn execute(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        // Re-check the filters: remote state may have changed since the
        // decision was made.
        if ctx
            .options
            .filter
            .is_ignored_remote(&self.remote_root, &self.remote)
        {
            ctx.reporter.skipped();
            return Ok(());
        }

        if self.remote.is_directory {
            return self.download_folder(ctx).await;
        }

        if ctx
            .options
            .filter
            .is_size_invalid(self.remote.path.as_str(), self.remote.size)
        {
            ctx.reporter.skipped();
            return Ok(());
        }

        // Content without a published hash cannot be verified after
        // transfer; skip it rather than store something unverifiable.
        if self.remote.size > 0 && self.remote.hashes.as_ref().map_or(true, |h| h.is_empty()) {
            warn!(
                path = %self.remote.path,
                "remote file publishes no content hash, skipping undownloadable file"
            );
            ctx.reporter.skipped();
            return Ok(());
        }

        let started = Instant::now();
        let tmp = ctx
            .store
            .create_file(&self.parent, &format!("{}.tmp", self.remote.name))
            .await?;

        match self.fetch_and_install(ctx, &tmp).await {
            Ok(()) => {
                info!(
                    bytes = self.remote.size,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    kind = if self.replace { "replace" } else { "new" },
                    path = %self.remote.path,
                    "downloaded file"
                );
                ctx.reporter.file_downloaded(self.replace, self.remote.size);
                Ok(())
            }
            Err(err) => {
                // Best effort; the temp file is already suspect.
                if let Err(cleanup_err) = ctx.store.delete(&tmp).await {
                    warn!(
                        path = %tmp.display(),
                        %cleanup_err,
                        "unable to remove temporary file"
                    );
                }
                Err(err)
            }
        }
    }

    /// Creates the local directory and queues one download per remote child
    async fn download_folder(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        let new_parent = ctx
            .store
            .create_folder(&self.parent, &self.remote.name)
            .await?;

        for child in ctx.api.get_children(&self.remote).await? {
            ctx.queue.add(Task::download(
                new_parent.clone(),
                self.remote_root.clone(),
                child,
                false,
            )?);
        }
        Ok(())
    }

    /// Transfers into the temp file, verifies, stamps timestamps, and
    /// renames into place.
    ///
    /// A zero-byte remote file is materialized from the (already empty)
    /// temp file without any network transfer.
    async fn fetch_and_install(&self, ctx: &TaskContext, tmp: &Path) -> Result<(), SyncError> {
        if self.remote.size > 0 {
            ctx.api.download(&self.remote, tmp).await?;
            self.verify_content(ctx, tmp).await?;
        }

        ctx.store
            .set_attributes(tmp, self.remote.created, self.remote.modified)
            .await?;
        ctx.store
            .replace_file(&self.parent.join(&self.remote.name), tmp)
            .await?;
        Ok(())
    }

    /// Integrity check on the downloaded bytes: CRC32 preferred, SHA-1
    /// fallback, failure if neither is available
    async fn verify_content(&self, ctx: &TaskContext, tmp: &Path) -> Result<(), SyncError> {
        let hashes = self.remote.hashes.as_ref();

        if let Some(crc) = hashes.and_then(|h| h.crc32) {
            if !ctx.store.verify_crc(tmp, crc).await? {
                return Err(SyncError::Integrity {
                    path: self.remote.path.to_string(),
                    reason: "CRC32 mismatch after download".into(),
                });
            }
        } else if let Some(sha1) = hashes.and_then(|h| h.sha1.as_deref()) {
            if !ctx.store.verify_sha1(tmp, sha1).await? {
                return Err(SyncError::Integrity {
                    path: self.remote.path.to_string(),
                    reason: "SHA-1 mismatch after download".into(),
                });
            }
        } else {
            return Err(SyncError::Integrity {
                path: self.remote.path.to_string(),
                reason: "no content hash available to verify download".into(),
            });
        }
        Ok(())
    }
}
