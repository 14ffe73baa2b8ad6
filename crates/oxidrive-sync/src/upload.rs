//! UploadTask - pushes one local file or folder to the remote drive
//!
//! A folder upload creates the remote container and fans out one child
//! task per entry; a file upload is a single-shot request, or a resumable
//! chunked session above the configured size threshold. Chunk failures
//! are retried locally (counter reset on every success) without restarting
//! the whole task.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};

use crate::task::{list_local_children, Task, TaskContext};

/// Decided transfers run ahead of further tree exploration
pub(crate) const PRIORITY: u8 = 50;

/// Uploads one local node under a remote parent folder
pub struct UploadTask {
    parent: RemoteNode,
    local_root: PathBuf,
    local: LocalNode,
    replace: bool,
}

impl UploadTask {
    /// Fails immediately if the destination parent is not a container
    pub(crate) fn new(
        parent: RemoteNode,
        local_root: PathBuf,
        local: LocalNode,
        replace: bool,
    ) -> Result<Self, SyncError> {
        if !parent.is_directory {
            return Err(SyncError::InvalidTask(format!(
                "upload parent '{}' is not a folder",
                parent.path
            )));
        }
        Ok(Self {
            parent,
            local_root,
            local,
            replace,
        })
    }

    pub(crate) fn describe(&self) -> String {
        format!("upload {}", self.parent.path.join(&self.local.name()))
    }

    pub(crate) async fn execute(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        // Re-check the filters: local state may have changed since the
        // decision was made.
        if ctx
            .options
            .filter
            .is_ignored_local(&self.local_root, &self.local)
        {
            ctx.reporter.skipped();
            return Ok(());
        }

        if self.local.is_dir() {
            return self.upload_folder(ctx).await;
        }

        let size = self.local.size()?;
        if ctx
            .options
            .filter
            .is_size_invalid(&self.local.path().display().to_string(), size)
        {
            ctx.reporter.skipped();
            return Ok(());
        }

        let started = Instant::now();
        let response = if size > ctx.options.split_after {
            self.upload_chunked(ctx).await?
        } else if self.replace {
            ctx.api.replace_file(&self.parent, &self.local).await?
        } else {
            ctx.api.upload_file(&self.parent, &self.local).await?
        };

        self.verify_response(ctx, &response).await?;

        info!(
            bytes = size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            kind = if self.replace { "replace" } else { "new" },
            path = %response.path,
            "uploaded file"
        );
        ctx.reporter.file_uploaded(self.replace, size);
        Ok(())
    }

    /// Creates the remote container and queues one upload per child
    async fn upload_folder(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        let new_parent = ctx
            .api
            .create_folder(&self.parent, &self.local.name())
            .await?;

        for child in list_local_children(self.local.path()).await? {
            ctx.queue.add(Task::upload(
                new_parent.clone(),
                self.local_root.clone(),
                child,
                false,
            )?);
        }
        Ok(())
    }

    /// Drives a resumable upload session chunk by chunk.
    ///
    /// A failed chunk increments a local retry counter that is reset on
    /// the next success; the task gives up only once that counter reaches
    /// the shared max-tries without an intervening success.
    async fn upload_chunked(&self, ctx: &TaskContext) -> Result<RemoteNode, SyncError> {
        let mut session = ctx
            .api
            .start_upload_session(&self.parent, &self.local)
            .await?;
        let mut chunk_failures: u32 = 0;

        while !session.is_complete() {
            if chunk_failures >= ctx.options.max_tries {
                return Err(SyncError::ChunkRetriesExhausted {
                    tries: chunk_failures,
                });
            }

            let chunk_started = Instant::now();
            match ctx.api.upload_chunk(&mut session).await {
                Ok(()) => {
                    chunk_failures = 0;
                    info!(
                        progress = format!("{:.1}%", session.progress_percent()),
                        bytes = session.last_uploaded,
                        elapsed_ms = chunk_started.elapsed().as_millis() as u64,
                        path = %self.local.path().display(),
                        "uploaded chunk"
                    );
                }
                Err(err) => {
                    chunk_failures += 1;
                    warn!(
                        %err,
                        consecutive_failures = chunk_failures,
                        path = %self.local.path().display(),
                        "chunk upload failed"
                    );
                }
            }
        }

        session.result.take().ok_or_else(|| {
            SyncError::Other("upload session completed without returning an item".into())
        })
    }

    /// Verifies the uploaded content against hashes the service returned.
    ///
    /// A response without hashes is accepted as-is; not every service
    /// publishes them on upload.
    async fn verify_response(
        &self,
        ctx: &TaskContext,
        response: &RemoteNode,
    ) -> Result<(), SyncError> {
        let Some(hashes) = &response.hashes else {
            return Ok(());
        };

        if let Some(crc) = hashes.crc32 {
            if !ctx.store.verify_crc(self.local.path(), crc).await? {
                return Err(SyncError::Integrity {
                    path: self.local.path().display().to_string(),
                    reason: "CRC32 mismatch after upload".into(),
                });
            }
        } else if let Some(sha1) = &hashes.sha1 {
            if !ctx.store.verify_sha1(self.local.path(), sha1).await? {
                return Err(SyncError::Integrity {
                    path: self.local.path().display().to_string(),
                    reason: "SHA-1 mismatch after upload".into(),
                });
            }
        }
        Ok(())
    }
}
