//! CheckTask - the recursive diff algorithm
//!
//! Turns one (remote node, local node) pair into typed actions. Recursion
//! is flattened into the queue: a folder pair produces one new CheckTask
//! per matching child instead of a recursive call, so stack depth never
//! grows with tree depth and sibling subtrees parallelize across workers.
//!
//! A CheckTask never performs a content mutation itself, with one
//! exception: the inline delete used to resolve a file/folder type
//! conflict before queueing the recreating transfer.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use oxidrive_core::config::SyncDirection;
use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};
use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::local_store::FileMatch;

use crate::delete::DeleteTask;
use crate::task::{list_local_children, Task, TaskContext};

/// Tree exploration runs behind deletes and decided transfers
pub(crate) const PRIORITY: u8 = 10;

/// Diff task for one (remote, local) pair
pub struct CheckTask {
    remote_root: RemotePath,
    remote: RemoteNode,
    local_root: PathBuf,
    local: LocalNode,
}

impl CheckTask {
    pub(crate) fn new(
        remote_root: RemotePath,
        remote: RemoteNode,
        local_root: PathBuf,
        local: LocalNode,
    ) -> Self {
        Self {
            remote_root,
            remote,
            local_root,
            local,
        }
    }

    pub(crate) fn describe(&self) -> String {
        format!(
            "check {} {}",
            if self.remote.is_directory {
                "folder"
            } else {
                "file"
            },
            self.remote.path
        )
    }

    pub(crate) async fn execute(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        if self.remote.is_directory && self.local.is_dir() {
            return self.sync_folders(ctx).await;
        }

        // Size and ignore filters apply to the authoritative side for the
        // configured direction.
        let filtered = match ctx.options.direction {
            SyncDirection::Up => {
                ctx.options.filter.is_size_invalid(
                    &self.local.path().display().to_string(),
                    self.local.size().unwrap_or(0),
                ) || ctx
                    .options
                    .filter
                    .is_ignored_local(&self.local_root, &self.local)
            }
            SyncDirection::Down => {
                ctx.options
                    .filter
                    .is_size_invalid(self.remote.path.as_str(), self.remote.size)
                    || ctx
                        .options
                        .filter
                        .is_ignored_remote(&self.remote_root, &self.remote)
            }
        };
        if filtered {
            ctx.reporter.skipped();
            return Ok(());
        }

        if self.local.is_file() && self.remote.is_file() {
            self.sync_files(ctx).await
        } else {
            self.resolve_type_conflict(ctx).await
        }
    }

    /// Both sides are folders: list both, pair children by name, and hand
    /// every child to [`CheckTask::process_child`]
    async fn sync_folders(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        let remote_children = ctx.api.get_children(&self.remote).await?;

        // Index the local entries by name; matched ones are popped so the
        // leftovers are exactly the local-only children.
        let mut local_index: HashMap<String, LocalNode> =
            match list_local_children(self.local.path()).await {
                Ok(children) => children
                    .into_iter()
                    .map(|child| (child.name(), child))
                    .collect(),
                Err(err) => {
                    // A whole unreadable subtree degrades to one skip, not
                    // a per-leaf error.
                    warn!(
                        path = %self.local.path().display(),
                        %err,
                        "unable to recurse into local directory"
                    );
                    ctx.reporter.skipped();
                    return Ok(());
                }
            };

        for remote_child in remote_children {
            if remote_child.is_directory && !ctx.options.recursive {
                continue;
            }
            let local_child = local_index.remove(&remote_child.name);
            self.process_child(ctx, Some(remote_child), local_child)?;
        }

        for (_, local_child) in local_index {
            if local_child.is_dir() && !ctx.options.recursive {
                continue;
            }
            self.process_child(ctx, None, Some(local_child))?;
        }

        Ok(())
    }

    /// Both sides are files: run the match algorithm and queue the
    /// matching action
    async fn sync_files(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        let outcome = ctx
            .store
            .verify_match(
                self.local.path(),
                self.remote.hashes.as_ref(),
                self.remote.size,
                self.remote.created,
                self.remote.modified,
            )
            .await?;

        match outcome {
            FileMatch::Mismatch => match ctx.options.direction {
                SyncDirection::Up => ctx.queue.add(Task::upload(
                    self.remote_parent()?,
                    self.local_root.clone(),
                    self.local.clone(),
                    true,
                )?),
                SyncDirection::Down => ctx.queue.add(Task::download(
                    self.local_parent()?,
                    self.remote_root.clone(),
                    self.remote.clone(),
                    true,
                )?),
            },
            FileMatch::ContentOnly => ctx
                .queue
                .add(Task::update_properties(self.remote.clone(), self.local.clone())),
            FileMatch::Exact => ctx.reporter.same(),
        }
        Ok(())
    }

    /// One side is a file, the other a folder: delete the obsolete side in
    /// place (not queued) and queue a transfer recreating it with the
    /// correct type
    async fn resolve_type_conflict(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        warn!(
            path = %self.remote.path,
            "file/folder type conflict, recreating from the authoritative side"
        );
        match ctx.options.direction {
            SyncDirection::Up => {
                DeleteTask::remote(self.remote.clone()).execute(ctx).await?;
                ctx.queue.add(Task::upload(
                    self.remote_parent()?,
                    self.local_root.clone(),
                    self.local.clone(),
                    true,
                )?);
            }
            SyncDirection::Down => {
                DeleteTask::local(self.local.clone()).execute(ctx).await?;
                ctx.queue.add(Task::download(
                    self.local_parent()?,
                    self.remote_root.clone(),
                    self.remote.clone(),
                    true,
                )?);
            }
        }
        Ok(())
    }

    /// Routes one child of a folder pair. Exactly one side may be absent.
    fn process_child(
        &self,
        ctx: &TaskContext,
        remote: Option<RemoteNode>,
        local: Option<LocalNode>,
    ) -> Result<(), SyncError> {
        if remote.is_none() && local.is_none() {
            return Err(SyncError::InvalidTask(
                "child processing requires at least one side".into(),
            ));
        }

        if let Some(remote) = &remote {
            if ctx
                .options
                .filter
                .is_ignored_remote(&self.remote_root, remote)
            {
                ctx.reporter.skipped();
                return Ok(());
            }
        }
        if let Some(local) = &local {
            if ctx.options.filter.is_ignored_local(&self.local_root, local) {
                ctx.reporter.skipped();
                return Ok(());
            }
        }

        match (remote, local) {
            // Present remotely only.
            (Some(remote), None) => match ctx.options.direction {
                SyncDirection::Up => ctx.queue.add(Task::delete_remote(remote)),
                SyncDirection::Down => ctx.queue.add(Task::download(
                    self.local.path().to_path_buf(),
                    self.remote_root.clone(),
                    remote,
                    false,
                )?),
            },
            // Present locally only.
            (None, Some(local)) => match ctx.options.direction {
                SyncDirection::Up => ctx.queue.add(Task::upload(
                    self.remote.clone(),
                    self.local_root.clone(),
                    local,
                    false,
                )?),
                SyncDirection::Down => ctx.queue.add(Task::delete_local(local)),
            },
            // Present on both sides: recurse through the queue.
            (Some(remote), Some(local)) => ctx.queue.add(Task::check(
                self.remote_root.clone(),
                remote,
                self.local_root.clone(),
                local,
            )),
            (None, None) => unreachable!("checked above"),
        }
        Ok(())
    }

    fn remote_parent(&self) -> Result<RemoteNode, SyncError> {
        self.remote.parent_ref().ok_or_else(|| {
            SyncError::InvalidTask(format!(
                "remote item '{}' has no parent to transfer into",
                self.remote.path
            ))
        })
    }

    fn local_parent(&self) -> Result<PathBuf, SyncError> {
        self.local
            .path()
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| {
                SyncError::InvalidTask(format!(
                    "local item '{}' has no parent to transfer into",
                    self.local.path().display()
                ))
            })
    }
}
