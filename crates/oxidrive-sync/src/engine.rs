//! Sync engine - worker pool driver
//!
//! Ties the scheduler together: seeds the root [`Task::check`] pair,
//! spawns a fixed-size pool of workers, waits for the whole transitive
//! task graph to reach a terminal state, and shuts the queue down so the
//! workers exit.
//!
//! ## Worker contract
//!
//! Each worker is one loop: take a task, run it to completion, mark it
//! done. A worker never interleaves two tasks; parallelism comes purely
//! from pool width. Children are enqueued inside the parent's run, before
//! `done()`, which is what makes completion detection sound.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};
use oxidrive_core::ports::local_store::LocalStore;
use oxidrive_core::ports::remote_drive::RemoteDrive;

use crate::queue::TaskQueue;
use crate::reporter::{SyncReport, TaskReporter};
use crate::task::{SyncOptions, Task, TaskContext};

/// One-shot synchronization run
pub struct SyncEngine {
    ctx: Arc<TaskContext>,
}

impl SyncEngine {
    /// Wires a new engine from its collaborators
    pub fn new(
        api: Arc<dyn RemoteDrive>,
        store: Arc<dyn LocalStore>,
        options: SyncOptions,
    ) -> Self {
        let ctx = Arc::new(TaskContext {
            queue: Arc::new(TaskQueue::new()),
            api,
            store,
            reporter: Arc::new(TaskReporter::new()),
            options,
        });
        Self { ctx }
    }

    /// The reporter owned by this run, for emitting the final summary
    pub fn reporter(&self) -> &Arc<TaskReporter> {
        &self.ctx.reporter
    }

    /// Runs the synchronization to completion and returns the aggregate
    /// outcome.
    ///
    /// Both roots must be directories; everything below them is handled by
    /// the task graph, including permanent per-task failures (which are
    /// counted, not propagated).
    pub async fn run(&self, remote_root: RemoteNode, local_root: &Path) -> Result<SyncReport, SyncError> {
        if !remote_root.is_directory {
            return Err(SyncError::InvalidTask(format!(
                "remote root '{}' is not a folder",
                remote_root.path
            )));
        }
        if !local_root.is_dir() {
            return Err(SyncError::InvalidTask(format!(
                "local root '{}' is not a directory",
                local_root.display()
            )));
        }

        info!(
            remote_root = %remote_root.path,
            local_root = %local_root.display(),
            direction = %self.ctx.options.direction,
            workers = self.ctx.options.workers,
            "starting synchronization"
        );

        self.ctx.queue.add(Task::check(
            remote_root.path.clone(),
            remote_root,
            local_root.to_path_buf(),
            LocalNode::new(local_root),
        ));

        let workers = self.ctx.options.workers.max(1);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            handles.push(tokio::spawn(worker_loop(worker, self.ctx.clone())));
        }

        self.ctx.queue.wait_for_completion().await;
        self.ctx.queue.shutdown();
        for handle in handles {
            let _ = handle.await;
        }

        info!("synchronization complete");
        Ok(self.ctx.reporter.snapshot())
    }
}

/// One worker: take, run synchronously, mark done, until shutdown
async fn worker_loop(worker: usize, ctx: Arc<TaskContext>) {
    debug!(worker, "sync worker started");
    while let Some(task) = ctx.queue.take().await {
        task.run(&ctx).await;
        ctx.queue.done();
    }
    debug!(worker, "sync worker stopped");
}
