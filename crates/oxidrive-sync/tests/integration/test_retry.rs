//! Retry and backoff behavior under scripted failures
//!
//! These tests run under tokio's paused clock, so the asserted elapsed
//! times are exact consequences of the queue suspensions, not wall-clock
//! flakiness.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use oxidrive_core::config::SyncDirection;
use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};
use oxidrive_core::domain::newtypes::RemotePath;
use oxidrive_core::ports::remote_drive::{DriveQuota, RemoteDrive, UploadSession};
use oxidrive_sync::store::RwLocalStore;
use oxidrive_sync::{SyncEngine, SyncReport};

use crate::common::options;

/// A drive whose listing calls always fail the same way
struct FailingDrive {
    /// HTTP status to fail with; `None` fails with a non-HTTP error
    status: Option<u16>,
    calls: AtomicU32,
}

impl FailingDrive {
    fn new(status: Option<u16>) -> Self {
        Self {
            status,
            calls: AtomicU32::new(0),
        }
    }

    fn failure(&self) -> SyncError {
        match self.status {
            Some(status) => SyncError::http(status, "scripted failure"),
            None => SyncError::Other("scripted failure".into()),
        }
    }
}

#[async_trait::async_trait]
impl RemoteDrive for FailingDrive {
    async fn get_root(&self) -> Result<RemoteNode, SyncError> {
        Ok(RemoteNode::synthetic_folder(RemotePath::root()))
    }

    async fn get_by_path(&self, _path: &RemotePath) -> Result<RemoteNode, SyncError> {
        Err(self.failure())
    }

    async fn get_children(&self, _node: &RemoteNode) -> Result<Vec<RemoteNode>, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.failure())
    }

    async fn create_folder(
        &self,
        _parent: &RemoteNode,
        _name: &str,
    ) -> Result<RemoteNode, SyncError> {
        Err(SyncError::Other("unexpected call".into()))
    }

    async fn upload_file(
        &self,
        _parent: &RemoteNode,
        _file: &LocalNode,
    ) -> Result<RemoteNode, SyncError> {
        Err(SyncError::Other("unexpected call".into()))
    }

    async fn replace_file(
        &self,
        _parent: &RemoteNode,
        _file: &LocalNode,
    ) -> Result<RemoteNode, SyncError> {
        Err(SyncError::Other("unexpected call".into()))
    }

    async fn start_upload_session(
        &self,
        _parent: &RemoteNode,
        _file: &LocalNode,
    ) -> Result<UploadSession, SyncError> {
        Err(SyncError::Other("unexpected call".into()))
    }

    async fn upload_chunk(&self, _session: &mut UploadSession) -> Result<(), SyncError> {
        Err(SyncError::Other("unexpected call".into()))
    }

    async fn download(&self, _node: &RemoteNode, _dest: &Path) -> Result<(), SyncError> {
        Err(SyncError::Other("unexpected call".into()))
    }

    async fn delete(&self, _node: &RemoteNode) -> Result<(), SyncError> {
        Err(SyncError::Other("unexpected call".into()))
    }

    async fn set_properties(
        &self,
        _node: &RemoteNode,
        _created: Option<DateTime<Utc>>,
        _modified: Option<DateTime<Utc>>,
    ) -> Result<(), SyncError> {
        Err(SyncError::Other("unexpected call".into()))
    }

    async fn get_quota(&self) -> Result<DriveQuota, SyncError> {
        Ok(DriveQuota { used: 0, total: 0 })
    }
}

async fn run_failing(drive: Arc<FailingDrive>, max_tries: u32) -> SyncReport {
    let local = tempfile::tempdir().unwrap();
    let mut opts = options(SyncDirection::Down);
    opts.max_tries = max_tries;

    let engine = SyncEngine::new(drive, Arc::new(RwLocalStore::new(false)), opts);
    let report = engine
        .run(
            RemoteNode::synthetic_folder(RemotePath::root()),
            local.path(),
        )
        .await
        .unwrap();
    report
}

#[tokio::test(start_paused = true)]
async fn test_503_exhaustion_runs_suspends_and_reports_once() {
    let drive = Arc::new(FailingDrive::new(Some(503)));
    let started = tokio::time::Instant::now();

    let report = run_failing(drive.clone(), 3).await;

    // Three runs; the first two each applied a 10-second suspension, the
    // exhausted third did not.
    assert_eq!(drive.calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert!(started.elapsed() < Duration::from_secs(21));
    assert_eq!(report.errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limiting_applies_long_backoff() {
    let drive = Arc::new(FailingDrive::new(Some(429)));
    let started = tokio::time::Instant::now();

    let report = run_failing(drive.clone(), 2).await;

    assert_eq!(drive.calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(started.elapsed() < Duration::from_secs(61));
    assert_eq!(report.errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failures_retry_without_backoff() {
    let drive = Arc::new(FailingDrive::new(Some(401)));
    let started = tokio::time::Instant::now();

    let report = run_failing(drive.clone(), 3).await;

    assert_eq!(drive.calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_failures_apply_short_backoff() {
    let drive = Arc::new(FailingDrive::new(None));
    let started = tokio::time::Instant::now();

    let report = run_failing(drive.clone(), 2).await;

    assert_eq!(drive.calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_http_status_retries_without_backoff() {
    let drive = Arc::new(FailingDrive::new(Some(418)));
    let started = tokio::time::Instant::now();

    let report = run_failing(drive.clone(), 3).await;

    assert_eq!(drive.calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.errors, 1);
}
