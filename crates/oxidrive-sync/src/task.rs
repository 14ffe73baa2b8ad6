//! Task identity, dispatch, and the retry state machine
//!
//! A [`Task`] is one unit of sync work: a closed set of five variants, each
//! with a fixed priority and an execute operation. Tasks are created when
//! the diff algorithm decides an action is needed, and are retired on
//! success, on permanent failure, or re-enqueued (same logical unit,
//! incremented attempt) for retry.
//!
//! ## Failure classification
//!
//! | Condition | Action |
//! |---|---|
//! | HTTP 401 | log, retry without backoff |
//! | HTTP 500/502/503/504 | global 10s suspension, retry |
//! | HTTP 429/509 | global 60s suspension, retry |
//! | other HTTP status | log, retry without backoff |
//! | any other error | global 1s suspension, retry |
//!
//! Retries share one attempt counter per task; there is no per-class
//! budget. Once the configured number of tries is exhausted the task is
//! recorded as a permanent failure and the run continues.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use oxidrive_core::config::{Config, SyncDirection};
use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};
use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::local_store::LocalStore;
use oxidrive_core::ports::remote_drive::RemoteDrive;

use crate::check::CheckTask;
use crate::delete::DeleteTask;
use crate::download::DownloadTask;
use crate::filter::PathFilter;
use crate::properties::UpdatePropertiesTask;
use crate::queue::TaskQueue;
use crate::reporter::TaskReporter;
use crate::upload::UploadTask;

/// Suspension applied before retrying after a 5xx server failure
const SERVER_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Suspension applied before retrying after rate limiting (429/509)
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Suspension applied before retrying after an unclassified failure
const GENERIC_BACKOFF: Duration = Duration::from_secs(1);

/// Global task identity counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// SyncOptions / TaskContext
// ============================================================================

/// Read-only slice of the configuration consumed by tasks
#[derive(Clone)]
pub struct SyncOptions {
    /// Direction of the run, fixed for its whole duration
    pub direction: SyncDirection,
    /// Whether to descend into subdirectories
    pub recursive: bool,
    /// Number of parallel sync workers
    pub workers: usize,
    /// Attempts per task before it becomes a permanent failure
    pub max_tries: u32,
    /// Uploads above this many bytes use a resumable chunked session
    pub split_after: u64,
    /// Ignore-pattern and size filter
    pub filter: Arc<PathFilter>,
}

impl SyncOptions {
    /// Builds sync options (including the compiled ignore filter) from the
    /// loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Ok(Self {
            direction: config.sync.direction,
            recursive: config.sync.recursive,
            workers: config.sync.workers,
            max_tries: config.sync.max_tries,
            split_after: config.split_after_bytes(),
            filter: Arc::new(PathFilter::new(
                config.filters.max_size_kb,
                &config.filters.ignored,
            )?),
        })
    }
}

/// Everything a task needs to do its work, passed explicitly rather than
/// reached through ambient state
pub struct TaskContext {
    /// The shared coordination point between workers
    pub queue: Arc<TaskQueue>,
    /// Remote storage operations
    pub api: Arc<dyn RemoteDrive>,
    /// Local filesystem mutations and verification
    pub store: Arc<dyn LocalStore>,
    /// Aggregate outcome counters
    pub reporter: Arc<TaskReporter>,
    /// Read-only run configuration
    pub options: SyncOptions,
}

// ============================================================================
// Task
// ============================================================================

/// The closed set of concrete task variants
pub enum TaskKind {
    Check(CheckTask),
    Upload(UploadTask),
    Download(DownloadTask),
    Delete(DeleteTask),
    UpdateProperties(UpdatePropertiesTask),
}

/// One schedulable unit of sync work with its retry state
pub struct Task {
    id: u64,
    attempt: u32,
    kind: TaskKind,
}

impl Task {
    fn new(kind: TaskKind) -> Self {
        Self {
            id: TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            attempt: 0,
            kind,
        }
    }

    /// Creates a diff task for one (remote, local) pair
    pub fn check(
        remote_root: RemotePath,
        remote: RemoteNode,
        local_root: PathBuf,
        local: LocalNode,
    ) -> Self {
        Self::new(TaskKind::Check(CheckTask::new(
            remote_root,
            remote,
            local_root,
            local,
        )))
    }

    /// Creates an upload task. Fails if `parent` is not a folder.
    pub fn upload(
        parent: RemoteNode,
        local_root: PathBuf,
        local: LocalNode,
        replace: bool,
    ) -> Result<Self, SyncError> {
        Ok(Self::new(TaskKind::Upload(UploadTask::new(
            parent, local_root, local, replace,
        )?)))
    }

    /// Creates a download task. Fails if `parent` exists and is not a
    /// directory.
    pub fn download(
        parent: PathBuf,
        remote_root: RemotePath,
        remote: RemoteNode,
        replace: bool,
    ) -> Result<Self, SyncError> {
        Ok(Self::new(TaskKind::Download(DownloadTask::new(
            parent,
            remote_root,
            remote,
            replace,
        )?)))
    }

    /// Creates a task deleting one remote item (cascades server-side)
    pub fn delete_remote(node: RemoteNode) -> Self {
        Self::new(TaskKind::Delete(DeleteTask::remote(node)))
    }

    /// Creates a task deleting one local file or subtree
    pub fn delete_local(node: LocalNode) -> Self {
        Self::new(TaskKind::Delete(DeleteTask::local(node)))
    }

    /// Creates a timestamps-only update task for a matching file pair
    pub fn update_properties(remote: RemoteNode, local: LocalNode) -> Self {
        Self::new(TaskKind::UpdateProperties(UpdatePropertiesTask::new(
            remote, local,
        )))
    }

    /// Task identity (unique per process)
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of times this task has been run so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Fixed scheduling priority of this task's kind
    pub fn priority(&self) -> u8 {
        match &self.kind {
            TaskKind::Check(_) => crate::check::PRIORITY,
            TaskKind::Upload(_) => crate::upload::PRIORITY,
            TaskKind::Download(_) => crate::download::PRIORITY,
            TaskKind::Delete(_) => crate::delete::PRIORITY,
            TaskKind::UpdateProperties(_) => crate::properties::PRIORITY,
        }
    }

    /// Human-readable description, for diagnostics only
    pub fn describe(&self) -> String {
        match &self.kind {
            TaskKind::Check(t) => t.describe(),
            TaskKind::Upload(t) => t.describe(),
            TaskKind::Download(t) => t.describe(),
            TaskKind::Delete(t) => t.describe(),
            TaskKind::UpdateProperties(t) => t.describe(),
        }
    }

    /// `id:attempt` tag used in log lines
    fn tag(&self) -> String {
        format!("{}:{}", self.id, self.attempt)
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<(), SyncError> {
        match &self.kind {
            TaskKind::Check(t) => t.execute(ctx).await,
            TaskKind::Upload(t) => t.execute(ctx).await,
            TaskKind::Download(t) => t.execute(ctx).await,
            TaskKind::Delete(t) => t.execute(ctx).await,
            TaskKind::UpdateProperties(t) => t.execute(ctx).await,
        }
    }

    /// Runs one attempt of this task.
    ///
    /// On failure the error is classified; if attempts remain, the matching
    /// global suspension is applied and the task re-enters the queue.
    /// Otherwise the failure is permanent: one error-level log line plus an
    /// aggregate error count, and the run continues.
    pub async fn run(mut self, ctx: &TaskContext) {
        self.attempt += 1;
        debug!(task = %self.tag(), "starting task - {}", self.describe());

        let err = match self.execute(ctx).await {
            Ok(()) => return,
            Err(err) => err,
        };

        let backoff = match err.status() {
            Some(401) => {
                warn!(task = %self.tag(), %err, "authentication failure");
                None
            }
            Some(500 | 502 | 503 | 504) => {
                warn!(task = %self.tag(), %err, "transient server failure");
                Some(SERVER_ERROR_BACKOFF)
            }
            Some(429 | 509) => {
                warn!(task = %self.tag(), %err, "rate limited by the service");
                Some(RATE_LIMIT_BACKOFF)
            }
            Some(status) => {
                warn!(task = %self.tag(), status, %err, "unexpected HTTP status");
                None
            }
            None => {
                error!(task = %self.tag(), %err, "task failed");
                Some(GENERIC_BACKOFF)
            }
        };

        if self.attempt < ctx.options.max_tries {
            if let Some(backoff) = backoff {
                ctx.queue.suspend(backoff);
            }
            ctx.queue.add(self);
        } else {
            ctx.reporter.error();
            error!(task = self.id, "task did not complete - {}", self.describe());
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Lists the entries of a local directory as [`LocalNode`]s.
///
/// Used by the diff and upload fan-out paths; any I/O failure is reported
/// as a whole so callers can degrade to a single subtree-level skip.
pub(crate) async fn list_local_children(dir: &Path) -> std::io::Result<Vec<LocalNode>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        children.push(LocalNode::new(entry.path()));
    }
    Ok(children)
}
