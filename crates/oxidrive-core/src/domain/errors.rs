//! Synchronization error taxonomy
//!
//! A single error type flows through both capability ports and the task
//! engine. The retry policy classifies failures by matching on these
//! variants, so adapters must map their native errors faithfully:
//! HTTP-level failures keep their status code, transport-level failures
//! (DNS, connect, timeout) become [`SyncError::Transport`], and local
//! filesystem failures become [`SyncError::Io`].

use thiserror::Error;

/// Errors that can occur while synchronizing one node
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote service answered with a non-success HTTP status.
    ///
    /// The status code drives the backoff class: 401 and unclassified
    /// statuses retry without backoff, 5xx triggers a short global
    /// suspension, 429/509 a long one.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code as received from the service
        status: u16,
        /// Response body or reason phrase, for diagnostics only
        message: String,
    },

    /// The request never produced an HTTP response (DNS, connect, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// A local filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A downloaded or uploaded file did not match the expected content hash
    #[error("integrity check failed for '{path}': {reason}")]
    Integrity {
        /// Path of the file that failed verification
        path: String,
        /// Which hash comparison failed
        reason: String,
    },

    /// A resumable upload session exhausted its chunk retry budget
    #[error("gave up on chunked upload after {tries} consecutive chunk failures")]
    ChunkRetriesExhausted {
        /// Number of consecutive failed chunk attempts
        tries: u32,
    },

    /// A task was constructed or invoked with invalid inputs.
    ///
    /// This is an internal invariant violation (for example, child
    /// processing with neither side present, or a transfer whose
    /// destination parent is not a container).
    #[error("invalid task input: {0}")]
    InvalidTask(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Convenience constructor for HTTP failures
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code if this is an HTTP failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
