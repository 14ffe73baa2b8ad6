//! Concurrent priority task queue
//!
//! The [`TaskQueue`] is the sole coordination point between sync workers.
//! It combines four responsibilities under one synchronization discipline:
//!
//! 1. A priority multiset of pending tasks (higher priority dequeues first)
//! 2. An in-flight counter, so completion can be detected without a window
//!    between a worker taking a task and that task re-enqueueing children
//! 3. A global suspend deadline used as backoff: [`TaskQueue::take`] does
//!    not return new work before the deadline, and concurrent suspensions
//!    converge to the furthest deadline
//! 4. Shutdown: a cancelled queue wakes every blocked `take()` caller
//!    without handing out a task
//!
//! ## Ordering
//!
//! Running deletes and already-decided transfers ahead of further tree
//! exploration bounds the number of open pending-decision branches and
//! favors convergence over breadth-first fan-out. Among equal priorities,
//! order is unspecified (insertion order in practice).

use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::task::Task;

// ============================================================================
// Heap entry
// ============================================================================

/// One pending task, ordered by (priority desc, sequence asc)
struct QueuedTask {
    priority: u8,
    seq: u64,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority wins; earlier sequence breaks ties so
        // dequeue order stays total and deterministic.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

// ============================================================================
// TaskQueue
// ============================================================================

/// Mutable queue state, always accessed under one lock
struct QueueState {
    heap: BinaryHeap<QueuedTask>,
    in_flight: usize,
    suspend_until: Option<Instant>,
    next_seq: u64,
}

/// Concurrent priority queue with global backoff suspension
pub struct TaskQueue {
    state: Mutex<QueueState>,
    /// Wakes workers blocked in [`TaskQueue::take`]
    work: Notify,
    /// Wakes callers blocked in [`TaskQueue::wait_for_completion`]
    idle: Notify,
    /// Cancelled on shutdown
    cancel: CancellationToken,
}

impl TaskQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                in_flight: 0,
                suspend_until: None,
                next_seq: 0,
            }),
            work: Notify::new(),
            idle: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Enqueues a task. Never blocks.
    pub fn add(&self, task: Task) {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_seq;
        state.next_seq += 1;
        debug!(
            task = task.id(),
            priority = task.priority(),
            pending = state.heap.len() + 1,
            "enqueueing task"
        );
        state.heap.push(QueuedTask {
            priority: task.priority(),
            seq,
            task,
        });
        drop(state);
        self.work.notify_one();
    }

    /// Dequeues the highest-priority ready task.
    ///
    /// Blocks while the queue is empty or while the global suspend deadline
    /// has not elapsed. Returns `None` once the queue has been shut down.
    pub async fn take(&self) -> Option<Task> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            // Wait out a pending global suspension before even looking at
            // the heap. The deadline may move later while we sleep, so
            // re-check from the top afterwards.
            let deadline = self.state.lock().unwrap().suspend_until;
            if let Some(deadline) = deadline {
                if deadline > Instant::now() {
                    tokio::select! {
                        _ = time::sleep_until(deadline) => {}
                        _ = self.cancel.cancelled() => return None,
                    }
                    continue;
                }
            }

            // Arm the notification before inspecting the heap so an `add`
            // racing with us cannot be missed.
            let notified = self.work.notified();
            {
                let mut state = self.state.lock().unwrap();
                let still_suspended = state
                    .suspend_until
                    .is_some_and(|deadline| deadline > Instant::now());
                if !still_suspended {
                    if let Some(entry) = state.heap.pop() {
                        // The in-flight increment shares the lock with the
                        // pop: completion detection can never observe an
                        // empty heap while this task is unaccounted for.
                        state.in_flight += 1;
                        // Notify stores at most one permit, so several adds
                        // may have collapsed into it; pass the wakeup on if
                        // work remains for another worker.
                        if !state.heap.is_empty() {
                            self.work.notify_one();
                        }
                        return Some(entry.task);
                    }
                }
            }

            tokio::select! {
                _ = notified => {}
                _ = self.cancel.cancelled() => return None,
            }
        }
    }

    /// Marks one taken task as finished, successfully or not.
    ///
    /// Must be called exactly once per task returned by [`TaskQueue::take`],
    /// after the task body has run (and therefore after any children it
    /// produced were enqueued).
    pub fn done(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.in_flight > 0, "done() without a matching take()");
        state.in_flight = state.in_flight.saturating_sub(1);
        let finished = state.heap.is_empty() && state.in_flight == 0;
        drop(state);
        if finished {
            self.idle.notify_waiters();
        }
    }

    /// Suspends dequeuing for `duration` from now.
    ///
    /// Deadlines only ever move later: a shorter suspension requested while
    /// a longer one is pending is ignored. In-flight work is not affected.
    pub fn suspend(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock().unwrap();
        let extends = state
            .suspend_until
            .map_or(true, |current| deadline > current);
        if extends {
            info!(seconds = duration.as_secs(), "suspending task queue");
            state.suspend_until = Some(deadline);
        }
    }

    /// Blocks until there are no pending tasks and no in-flight tasks.
    ///
    /// Because tasks enqueue their children before being marked done, the
    /// (pending == 0 && in-flight == 0) condition observed under the lock
    /// means the whole transitive task graph has reached a terminal state.
    /// Also returns if the queue is shut down while waiting.
    pub async fn wait_for_completion(&self) {
        loop {
            let notified = self.idle.notified();
            {
                let state = self.state.lock().unwrap();
                if state.heap.is_empty() && state.in_flight == 0 {
                    return;
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = self.cancel.cancelled() => return,
            }
        }
    }

    /// Shuts the queue down: every blocked or future [`TaskQueue::take`]
    /// returns `None`, waking idle workers so the pool can exit.
    pub fn shutdown(&self) {
        info!("shutting down task queue");
        self.cancel.cancel();
    }

    /// Number of tasks currently waiting in the queue
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().heap.len()
    }

    /// Number of tasks currently being executed by workers
    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
