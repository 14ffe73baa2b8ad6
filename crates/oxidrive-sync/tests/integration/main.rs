//! Integration tests for the synchronization scheduler
//!
//! Runs the whole engine (queue, workers, tasks, reporter) against an
//! in-memory drive and a real temporary directory tree.

mod common;
mod test_retry;
