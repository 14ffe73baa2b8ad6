//! Thread-safe aggregate counters and the final summary
//!
//! One [`TaskReporter`] instance is owned by the run and passed explicitly
//! through construction. Counters are independent atomics so leaf tasks
//! never contend on a shared lock; [`TaskReporter::report`] emits the
//! human-readable summary and never fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use humansize::{format_size, BINARY};
use tracing::{error, info};

// ============================================================================
// TaskReporter
// ============================================================================

/// Aggregate outcome counters for one sync run
pub struct TaskReporter {
    same: AtomicU64,
    skipped: AtomicU64,
    local_deleted: AtomicU64,
    remote_deleted: AtomicU64,
    properties_updated: AtomicU64,
    errors: AtomicU64,

    new_uploaded: AtomicU64,
    new_uploaded_bytes: AtomicU64,
    replace_uploaded: AtomicU64,
    replace_uploaded_bytes: AtomicU64,

    new_downloaded: AtomicU64,
    new_downloaded_bytes: AtomicU64,
    replace_downloaded: AtomicU64,
    replace_downloaded_bytes: AtomicU64,

    started: Instant,
}

impl TaskReporter {
    /// Creates a reporter; elapsed time is measured from this moment
    pub fn new() -> Self {
        Self {
            same: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            local_deleted: AtomicU64::new(0),
            remote_deleted: AtomicU64::new(0),
            properties_updated: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            new_uploaded: AtomicU64::new(0),
            new_uploaded_bytes: AtomicU64::new(0),
            replace_uploaded: AtomicU64::new(0),
            replace_uploaded_bytes: AtomicU64::new(0),
            new_downloaded: AtomicU64::new(0),
            new_downloaded_bytes: AtomicU64::new(0),
            replace_downloaded: AtomicU64::new(0),
            replace_downloaded_bytes: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Records one file pair found already synchronized
    pub fn same(&self) {
        self.same.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one ignored, filtered, or undownloadable item (or one
    /// unreadable subtree)
    pub fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one local deletion
    pub fn local_deleted(&self) {
        self.local_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one remote deletion
    pub fn remote_deleted(&self) {
        self.remote_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one timestamps-only update
    pub fn properties_updated(&self) {
        self.properties_updated.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one permanently failed task
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one completed upload of `bytes`
    pub fn file_uploaded(&self, replace: bool, bytes: u64) {
        if replace {
            self.replace_uploaded.fetch_add(1, Ordering::Relaxed);
            self.replace_uploaded_bytes.fetch_add(bytes, Ordering::Relaxed);
        } else {
            self.new_uploaded.fetch_add(1, Ordering::Relaxed);
            self.new_uploaded_bytes.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    /// Records one completed download of `bytes`
    pub fn file_downloaded(&self, replace: bool, bytes: u64) {
        if replace {
            self.replace_downloaded.fetch_add(1, Ordering::Relaxed);
            self.replace_downloaded_bytes
                .fetch_add(bytes, Ordering::Relaxed);
        } else {
            self.new_downloaded.fetch_add(1, Ordering::Relaxed);
            self.new_downloaded_bytes.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    /// Number of permanently failed tasks so far
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Takes a consistent-enough snapshot of all counters
    pub fn snapshot(&self) -> SyncReport {
        SyncReport {
            same: self.same.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            local_deleted: self.local_deleted.load(Ordering::Relaxed),
            remote_deleted: self.remote_deleted.load(Ordering::Relaxed),
            properties_updated: self.properties_updated.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            new_uploaded: self.new_uploaded.load(Ordering::Relaxed),
            new_uploaded_bytes: self.new_uploaded_bytes.load(Ordering::Relaxed),
            replace_uploaded: self.replace_uploaded.load(Ordering::Relaxed),
            replace_uploaded_bytes: self.replace_uploaded_bytes.load(Ordering::Relaxed),
            new_downloaded: self.new_downloaded.load(Ordering::Relaxed),
            new_downloaded_bytes: self.new_downloaded_bytes.load(Ordering::Relaxed),
            replace_downloaded: self.replace_downloaded.load(Ordering::Relaxed),
            replace_downloaded_bytes: self.replace_downloaded_bytes.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }

    /// Emits the final human-readable summary.
    ///
    /// Only non-zero sections are printed. Never panics and never fails.
    pub fn report(&self) {
        let report = self.snapshot();

        if report.errors > 0 {
            error!(
                "{} task{} failed - see log for details",
                report.errors,
                plural(report.errors)
            );
        }

        if report.same > 0 {
            info!(
                "Skipped {} unchanged file{}",
                report.same,
                plural(report.same)
            );
        }

        if report.skipped > 0 {
            info!(
                "Skipped {} ignored/undownloadable file{}",
                report.skipped,
                plural(report.skipped)
            );
        }

        if report.local_deleted > 0 {
            info!(
                "Deleted {} local file{}",
                report.local_deleted,
                plural(report.local_deleted)
            );
        }

        if report.remote_deleted > 0 {
            info!(
                "Deleted {} remote file{}",
                report.remote_deleted,
                plural(report.remote_deleted)
            );
        }

        if report.properties_updated > 0 {
            info!(
                "Updated timestamps on {} file{}",
                report.properties_updated,
                plural(report.properties_updated)
            );
        }

        let uploaded = report.new_uploaded + report.replace_uploaded;
        if uploaded > 0 {
            let mut line = format!(
                "Uploaded {} file{} ({}) - ",
                uploaded,
                plural(uploaded),
                format_size(
                    report.new_uploaded_bytes + report.replace_uploaded_bytes,
                    BINARY
                )
            );
            if report.new_uploaded > 0 {
                line.push_str(&format!(
                    "{} new file{} ({}) ",
                    report.new_uploaded,
                    plural(report.new_uploaded),
                    format_size(report.new_uploaded_bytes, BINARY)
                ));
            }
            if report.replace_uploaded > 0 {
                line.push_str(&format!(
                    "{} replaced file{} ({}) ",
                    report.replace_uploaded,
                    plural(report.replace_uploaded),
                    format_size(report.replace_uploaded_bytes, BINARY)
                ));
            }
            info!("{}", line.trim_end());
        }

        let downloaded = report.new_downloaded + report.replace_downloaded;
        if downloaded > 0 {
            let mut line = format!(
                "Downloaded {} file{} ({}) - ",
                downloaded,
                plural(downloaded),
                format_size(
                    report.new_downloaded_bytes + report.replace_downloaded_bytes,
                    BINARY
                )
            );
            if report.new_downloaded > 0 {
                line.push_str(&format!(
                    "{} new file{} ({}) ",
                    report.new_downloaded,
                    plural(report.new_downloaded),
                    format_size(report.new_downloaded_bytes, BINARY)
                ));
            }
            if report.replace_downloaded > 0 {
                line.push_str(&format!(
                    "{} replaced file{} ({}) ",
                    report.replace_downloaded,
                    plural(report.replace_downloaded),
                    format_size(report.replace_downloaded_bytes, BINARY)
                ));
            }
            info!("{}", line.trim_end());
        }

        info!("Elapsed time: {}", readable_time(report.elapsed));
    }
}

impl Default for TaskReporter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SyncReport
// ============================================================================

/// Point-in-time snapshot of the aggregate counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub same: u64,
    pub skipped: u64,
    pub local_deleted: u64,
    pub remote_deleted: u64,
    pub properties_updated: u64,
    pub errors: u64,
    pub new_uploaded: u64,
    pub new_uploaded_bytes: u64,
    pub replace_uploaded: u64,
    pub replace_uploaded_bytes: u64,
    pub new_downloaded: u64,
    pub new_downloaded_bytes: u64,
    pub replace_downloaded: u64,
    pub replace_downloaded_bytes: u64,
    pub elapsed: Duration,
}

/// Formats a duration the way a human scans a sync log: millis below a
/// second, fractional seconds below a minute, `HH:MM:SS` above
fn readable_time(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let seconds = ms / 1000;
        format!(
            "{:02}:{:02}:{:02}",
            (seconds / 3600) % 24,
            (seconds / 60) % 60,
            seconds % 60
        )
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
