//! # Neighbor Merger
//!
//! Two-phase light merge:
//!
//! 1. `begin_merge` queues a job on the merge pipeline and keeps a
//!    `MergeHandle` for it. Returns immediately.
//! 2. `complete_merge` polls every handle once, without blocking, and
//!    returns the payloads of all jobs that finished since the last call.
//!
//! A job that fails, panics or is cancelled at shutdown resolves its
//! handle to an error. Its payload is not returned; the failure is logged,
//! counted and kept for `take_failures`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tessera_chunk::{merge_into, Chunk, ChunkId, Neighborhood};
use tessera_shared::IVec3;

use crate::error::{StreamingError, StreamingResult, TaskError};
use crate::pipeline::{PipelineStats, PipelineTask, TaskPipeline};

/// Result slot shared between a merge job and its handle.
struct MergeSlot<T> {
    done: AtomicBool,
    result: Mutex<Option<StreamingResult<T>>>,
}

impl<T> MergeSlot<T> {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            result: Mutex::new(None),
        }
    }

    /// Stores the result. Only the first call has any effect.
    fn resolve(&self, result: StreamingResult<T>) {
        let mut slot = self.result.lock();
        if self.done.load(Ordering::Acquire) {
            return;
        }
        *slot = Some(result);
        self.done.store(true, Ordering::Release);
    }
}

/// Handle to one in-flight merge job.
pub struct MergeHandle<T> {
    slot: Arc<MergeSlot<T>>,
    id: ChunkId,
    position: IVec3,
}

impl<T> MergeHandle<T> {
    /// Chunk being merged.
    #[must_use]
    pub const fn position(&self) -> IVec3 {
        self.position
    }

    /// Identity of the chunk being merged.
    #[must_use]
    pub const fn id(&self) -> ChunkId {
        self.id
    }

    /// Returns true if the job has finished (either way).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.slot.done.load(Ordering::Acquire)
    }

    /// Takes the result if the job has finished.
    pub fn try_take(&self) -> Option<StreamingResult<T>> {
        if !self.is_done() {
            return None;
        }
        self.slot.result.lock().take()
    }
}

/// A merge job that did not produce its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeFailure {
    /// Identity of the chunk being merged.
    pub id: ChunkId,
    /// Chunk being merged.
    pub position: IVec3,
    /// What went wrong.
    pub error: StreamingError,
}

struct MergeTask<T> {
    target: Arc<Chunk>,
    neighborhood: Neighborhood,
    payload: Option<T>,
    slot: Arc<MergeSlot<T>>,
    started: bool,
}

impl<T: Send + 'static> PipelineTask for MergeTask<T> {
    fn name(&self) -> &'static str {
        "Neighbor Light Merge"
    }

    fn position(&self) -> IVec3 {
        self.target.position()
    }

    fn run(mut self: Box<Self>) -> Result<(), TaskError> {
        self.started = true;
        let position = self.target.position();
        match merge_into(&self.target, &self.neighborhood) {
            Ok(()) => {
                if let Some(payload) = self.payload.take() {
                    self.slot.resolve(Ok(payload));
                }
                Ok(())
            }
            Err(error) => {
                self.slot.resolve(Err(StreamingError::MergeFailed {
                    position,
                    reason: error.to_string(),
                }));
                Err(error.into())
            }
        }
    }
}

impl<T> Drop for MergeTask<T> {
    fn drop(&mut self) {
        let position = self.target.position();
        if self.started {
            self.slot.resolve(Err(StreamingError::MergeFailed {
                position,
                reason: "merge job panicked".to_string(),
            }));
        } else {
            self.slot.resolve(Err(StreamingError::MergeCancelled(position)));
        }
    }
}

/// Runs neighbor light merges on a worker pool.
pub struct NeighborMerger<T> {
    pipeline: TaskPipeline,
    handles: Vec<MergeHandle<T>>,
    failures: Vec<MergeFailure>,
    failed_merges: u64,
}

impl<T: Send + 'static> NeighborMerger<T> {
    /// Starts a merger with `threads` workers named `chunk-merge-<index>`.
    ///
    /// # Errors
    ///
    /// Fails if the worker pool cannot be started.
    pub fn new(threads: usize) -> StreamingResult<Self> {
        Ok(Self {
            pipeline: TaskPipeline::new("chunk-merge", threads)?,
            handles: Vec::new(),
            failures: Vec::new(),
            failed_merges: 0,
        })
    }

    /// Queues a merge of `target` with its neighborhood. `payload` comes back from
    /// `complete_merge` once the job has finished.
    ///
    /// # Errors
    ///
    /// Returns `PipelineShutDown` after `shutdown`.
    pub fn begin_merge(
        &mut self,
        target: Arc<Chunk>,
        neighborhood: Neighborhood,
        payload: T,
        priority: i64,
    ) -> StreamingResult<()> {
        let slot = Arc::new(MergeSlot::new());
        let handle = MergeHandle {
            slot: Arc::clone(&slot),
            id: target.id(),
            position: target.position(),
        };
        let task = MergeTask {
            target,
            neighborhood,
            payload: Some(payload),
            slot,
            started: false,
        };
        self.pipeline.submit(Box::new(task), priority)?;
        self.handles.push(handle);
        Ok(())
    }

    /// Returns the payloads of all jobs finished since the last call. Never blocks.
    pub fn complete_merge(&mut self) -> Vec<T> {
        let mut finished = Vec::new();
        let failures = &mut self.failures;
        let failed_merges = &mut self.failed_merges;
        self.handles.retain(|handle| match handle.try_take() {
            None if handle.is_done() => false,
            None => true,
            Some(Ok(payload)) => {
                finished.push(payload);
                false
            }
            Some(Err(error)) => {
                tracing::warn!(chunk = %handle.position(), %error, "merge did not complete");
                *failed_merges += 1;
                failures.push(MergeFailure {
                    id: handle.id(),
                    position: handle.position(),
                    error,
                });
                false
            }
        });
        finished
    }

    /// Drains the failures recorded by `complete_merge`.
    pub fn take_failures(&mut self) -> Vec<MergeFailure> {
        std::mem::take(&mut self.failures)
    }

    /// Jobs begun but not yet returned by `complete_merge`.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.handles.len()
    }

    /// Jobs that failed or were cancelled.
    #[must_use]
    pub const fn failed_merges(&self) -> u64 {
        self.failed_merges
    }

    /// Re-keys queued jobs.
    pub fn rescore(&self, key: impl FnMut(IVec3) -> i64) {
        self.pipeline.rescore(key);
    }

    /// Statistics of the merge pool.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Waits until no merge job is queued or running. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.pipeline.wait_idle(timeout)
    }

    /// Stops the merge pool. Queued jobs resolve as cancelled.
    pub fn shutdown(&mut self) {
        self.pipeline.shutdown();
    }
}
