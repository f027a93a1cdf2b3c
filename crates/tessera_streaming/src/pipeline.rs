//! # Task Pipeline
//!
//! **Proximity-Ordered Worker Pool**
//!
//! Post-process and merge jobs are queued with a priority key (lower runs
//! first) and executed by a fixed set of named worker threads.
//!
//! ```text
//!   Producer ──┐                                  ┌──> worker-0
//!   Producer ──┼──> [Min-Heap by (key, seq)] ─────┼──> worker-1
//!   Consumer ──┘      (mutex + condvar)           └──> worker-N
//! ```
//!
//! Keys are fixed at submission; `rescore` re-keys everything still queued
//! when the viewer moves. Equal keys run in submission order. Completions
//! land in whatever order the workers finish.
//!
//! A task that returns an error or panics is logged and counted. The
//! worker that ran it keeps going.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tessera_shared::IVec3;

use crate::error::{StreamingError, StreamingResult, TaskError};

/// A unit of work for a `TaskPipeline`.
pub trait PipelineTask: Send + 'static {
    /// Short human-readable name, for logs.
    fn name(&self) -> &'static str;

    /// Chunk the task works on.
    fn position(&self) -> IVec3;

    /// Runs the task, consuming it.
    ///
    /// # Errors
    ///
    /// Any error is logged and counted as a failed task.
    fn run(self: Box<Self>) -> Result<(), TaskError>;
}

/// Statistics for one pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Tasks accepted.
    pub submitted: u64,
    /// Tasks that returned `Ok`.
    pub completed: u64,
    /// Tasks that returned an error or panicked.
    pub failed: u64,
    /// Tasks dropped unstarted at shutdown.
    pub cancelled: u64,
    /// Tasks waiting for a worker.
    pub queued: usize,
    /// Tasks currently running.
    pub in_flight: usize,
}

struct QueuedTask {
    key: i64,
    seq: u64,
    task: Box<dyn PipelineTask>,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // Reversed: BinaryHeap pops the maximum, we want the smallest (key, seq).
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(&self.key).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
    shutdown: bool,
    stats: PipelineStats,
}

struct Shared {
    name: String,
    state: Mutex<QueueState>,
    /// Signalled when a task is queued or on shutdown.
    not_empty: Condvar,
    /// Signalled when the queue drains and no task is running.
    idle: Condvar,
}

/// Fixed-size pool of worker threads fed from a priority queue.
pub struct TaskPipeline {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for TaskPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPipeline")
            .field("name", &self.shared.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl TaskPipeline {
    /// Starts `threads` workers named `<name>-<index>`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for zero threads, `WorkerSpawn` if the OS
    /// refuses a thread. Workers already started are shut down again.
    pub fn new(name: &str, threads: usize) -> StreamingResult<Self> {
        if threads == 0 {
            return Err(StreamingError::InvalidConfig(format!(
                "pipeline {name} needs at least one worker"
            )));
        }

        let shared = Arc::new(Shared {
            name: name.to_string(),
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
                stats: PipelineStats::default(),
            }),
            not_empty: Condvar::new(),
            idle: Condvar::new(),
        });

        let pipeline = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(threads)),
        };

        for index in 0..threads {
            let worker_shared = Arc::clone(&pipeline.shared);
            let handle = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || Self::worker_loop(&worker_shared))
                .map_err(|e| StreamingError::WorkerSpawn {
                    pipeline: name.to_string(),
                    reason: e.to_string(),
                })?;
            pipeline.workers.lock().push(handle);
        }

        tracing::debug!(pipeline = name, threads, "task pipeline started");
        Ok(pipeline)
    }

    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Worker thread main loop.
    fn worker_loop(shared: &Shared) {
        loop {
            let queued = {
                let mut state = shared.state.lock();
                loop {
                    if let Some(queued) = state.heap.pop() {
                        state.stats.queued = state.heap.len();
                        state.stats.in_flight += 1;
                        break queued;
                    }
                    if state.shutdown {
                        return;
                    }
                    shared.not_empty.wait(&mut state);
                }
            };

            let name = queued.task.name();
            let position = queued.task.position();
            let task = queued.task;
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || task.run()));

            let mut state = shared.state.lock();
            state.stats.in_flight -= 1;
            match outcome {
                Ok(Ok(())) => state.stats.completed += 1,
                Ok(Err(error)) => {
                    state.stats.failed += 1;
                    tracing::warn!(pipeline = %shared.name, task = name, chunk = %position, %error, "task failed");
                }
                Err(payload) => {
                    state.stats.failed += 1;
                    tracing::error!(
                        pipeline = %shared.name,
                        task = name,
                        chunk = %position,
                        reason = panic_message(payload.as_ref()),
                        "task panicked"
                    );
                }
            }
            if state.heap.is_empty() && state.stats.in_flight == 0 {
                shared.idle.notify_all();
            }
        }
    }

    /// Queues a task. Lower keys run first; equal keys run in submission order.
    ///
    /// # Errors
    ///
    /// Returns `PipelineShutDown` once `shutdown` has been called. The task is dropped.
    pub fn submit(&self, task: Box<dyn PipelineTask>, key: i64) -> StreamingResult<()> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            tracing::debug!(pipeline = %self.shared.name, task = task.name(), chunk = %task.position(), "submit after shutdown");
            return Err(StreamingError::PipelineShutDown(self.shared.name.clone()));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(QueuedTask { key, seq, task });
        state.stats.submitted += 1;
        state.stats.queued = state.heap.len();
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Recomputes the key of every queued task from its chunk position.
    pub fn rescore(&self, mut key: impl FnMut(IVec3) -> i64) {
        let mut state = self.shared.state.lock();
        let tasks = std::mem::take(&mut state.heap).into_vec();
        state.heap = tasks
            .into_iter()
            .map(|mut queued| {
                queued.key = key(queued.task.position());
                queued
            })
            .collect();
    }

    /// Returns current statistics.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.shared.state.lock().stats
    }

    /// Waits until the pipeline is idle. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !(state.heap.is_empty() && state.stats.in_flight == 0) {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return state.heap.is_empty() && state.stats.in_flight == 0;
            }
        }
        true
    }

    /// Returns true once `shutdown` has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Stops intake, cancels queued tasks and waits for running ones.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let cancelled = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            let cancelled = std::mem::take(&mut state.heap).into_vec();
            state.stats.cancelled += cancelled.len() as u64;
            state.stats.queued = 0;
            self.shared.not_empty.notify_all();
            cancelled
        };

        if !cancelled.is_empty() {
            tracing::info!(pipeline = %self.shared.name, cancelled = cancelled.len(), "cancelled queued tasks");
        }
        // Dropped outside the lock; task destructors may take other locks.
        drop(cancelled);

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!(pipeline = %self.shared.name, "worker thread panicked outside a task");
            }
        }
        self.shared.idle.notify_all();
    }
}

impl Drop for TaskPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Extracts the message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
