//! # Handoff Queues
//!
//! Everything that crosses from producer and worker threads to the consumer
//! goes through two crossbeam channels:
//!
//! ```text
//!   receive_chunk ──> [post-process pipeline] ──> ready queue (bounded) ──┐
//!                                                                         ├──> begin_update
//!   invalidate ─────────────────────────────────> invalidations ──────────┘
//! ```
//!
//! The ready queue is bounded. A worker waits at most `handoff_timeout`
//! for room, then drops the chunk with a warning. Invalidations are tiny
//! and never block.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, SendTimeoutError, Sender};
use tessera_chunk::{generate_internal_lighting, Chunk};
use tessera_shared::IVec3;

use crate::error::{StreamingError, StreamingResult, TaskError};
use crate::pipeline::{PipelineTask, TaskPipeline};
use crate::relevance::ReferencePoint;

/// Positions requested for removal, deduplicated per cycle.
pub type InvalidationSet = HashSet<IVec3>;

/// Worker side of the ready queue.
#[derive(Clone, Debug)]
pub struct HandoffSender {
    ready: Sender<Chunk>,
    timeout: Duration,
    dropped: Arc<AtomicU64>,
}

impl HandoffSender {
    /// Hands a post-processed chunk to the consumer.
    ///
    /// # Errors
    ///
    /// Returns `HandoffTimeout` if the queue stayed full, `HandoffDisconnected`
    /// if the consumer is gone. The chunk is disposed and counted as dropped.
    pub fn deliver(&self, chunk: Chunk) -> StreamingResult<()> {
        let position = chunk.position();
        let error = match self.ready.send_timeout(chunk, self.timeout) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(chunk)) => {
                chunk.dispose();
                StreamingError::HandoffTimeout(position)
            }
            Err(SendTimeoutError::Disconnected(chunk)) => {
                chunk.dispose();
                StreamingError::HandoffDisconnected(position)
            }
        };
        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(chunk = %position, %error, "dropping post-processed chunk");
        Err(error)
    }
}

/// Consumer side of both handoff queues.
#[derive(Debug)]
pub struct ReadyBuffer {
    ready: Receiver<Chunk>,
    invalidations: Receiver<IVec3>,
    dropped: Arc<AtomicU64>,
}

impl ReadyBuffer {
    /// Creates the queues. Returns the worker sender, the invalidation sender and the buffer.
    #[must_use]
    pub fn new(capacity: usize, timeout: Duration) -> (HandoffSender, Sender<IVec3>, Self) {
        let (ready_tx, ready_rx) = bounded(capacity);
        let (invalidate_tx, invalidate_rx) = unbounded();
        let dropped = Arc::new(AtomicU64::new(0));
        let sender = HandoffSender {
            ready: ready_tx,
            timeout,
            dropped: Arc::clone(&dropped),
        };
        let buffer = Self {
            ready: ready_rx,
            invalidations: invalidate_rx,
            dropped,
        };
        (sender, invalidate_tx, buffer)
    }

    /// Takes every chunk delivered so far. Never blocks.
    pub fn drain_ready(&self) -> Vec<Chunk> {
        self.ready.try_iter().collect()
    }

    /// Takes every invalidation requested so far. Never blocks.
    pub fn drain_invalidations(&self) -> InvalidationSet {
        self.invalidations.try_iter().collect()
    }

    /// Chunks waiting in the ready queue.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Chunks dropped because the handoff failed.
    #[must_use]
    pub fn dropped_handoffs(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Internal lighting and compaction of a freshly received chunk.
pub struct PostProcessTask {
    chunk: Chunk,
    handoff: HandoffSender,
}

impl PostProcessTask {
    /// Creates the task.
    #[must_use]
    pub fn new(chunk: Chunk, handoff: HandoffSender) -> Self {
        Self { chunk, handoff }
    }
}

impl PipelineTask for PostProcessTask {
    fn name(&self) -> &'static str {
        "Internal Light Generation"
    }

    fn position(&self) -> IVec3 {
        self.chunk.position()
    }

    fn run(self: Box<Self>) -> Result<(), TaskError> {
        let Self { mut chunk, handoff } = *self;
        generate_internal_lighting(&mut chunk);
        chunk.deflate();
        handoff.deliver(chunk)?;
        Ok(())
    }
}

/// Producer-facing handle. Cheap to clone, usable from any thread.
#[derive(Clone, Debug)]
pub struct ChunkProducer {
    pipeline: Arc<TaskPipeline>,
    handoff: HandoffSender,
    invalidations: Sender<IVec3>,
    reference: ReferencePoint,
}

impl ChunkProducer {
    /// Creates a producer feeding `pipeline`.
    #[must_use]
    pub fn new(
        pipeline: Arc<TaskPipeline>,
        handoff: HandoffSender,
        invalidations: Sender<IVec3>,
        reference: ReferencePoint,
    ) -> Self {
        Self {
            pipeline,
            handoff,
            invalidations,
            reference,
        }
    }

    /// Accepts a chunk from the network and schedules its post-processing.
    ///
    /// Returns as soon as the task is queued; nearer chunks are processed first.
    ///
    /// # Errors
    ///
    /// Returns `PipelineShutDown` once the provider is disposed.
    pub fn receive_chunk(&self, chunk: Chunk) -> StreamingResult<()> {
        let position = chunk.position();
        let key = self.reference.task_score(position);
        tracing::trace!(chunk = %position, key, "chunk received");
        self.pipeline
            .submit(Box::new(PostProcessTask::new(chunk, self.handoff.clone())), key)
    }

    /// Requests removal of the chunk at `position`. Applied on the next `begin_update`.
    ///
    /// # Errors
    ///
    /// Returns `HandoffDisconnected` once the provider is dropped.
    pub fn invalidate(&self, position: IVec3) -> StreamingResult<()> {
        self.invalidations
            .send(position)
            .map_err(|_| StreamingError::HandoffDisconnected(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_chunk::Block;
    use tessera_shared::{Vec3, CHUNK_VOLUME};

    fn air_chunk(position: IVec3) -> Chunk {
        Chunk::from_blocks(position, vec![Block::AIR; CHUNK_VOLUME]).unwrap()
    }

    #[test]
    fn test_deliver_and_drain() {
        let (sender, _invalidate, buffer) = ReadyBuffer::new(4, Duration::from_millis(10));
        sender.deliver(air_chunk(IVec3::ZERO)).unwrap();
        sender.deliver(air_chunk(IVec3::ONE)).unwrap();
        assert_eq!(buffer.ready_len(), 2);

        let drained: Vec<IVec3> = buffer.drain_ready().iter().map(Chunk::position).collect();
        assert_eq!(drained, vec![IVec3::ZERO, IVec3::ONE]);
        assert!(buffer.drain_ready().is_empty());
    }

    #[test]
    fn test_full_queue_drops_after_timeout() {
        let (sender, _invalidate, buffer) = ReadyBuffer::new(1, Duration::from_millis(5));
        sender.deliver(air_chunk(IVec3::ZERO)).unwrap();

        let err = sender.deliver(air_chunk(IVec3::ONE)).unwrap_err();
        assert_eq!(err, StreamingError::HandoffTimeout(IVec3::ONE));
        assert_eq!(buffer.dropped_handoffs(), 1);
        assert_eq!(buffer.ready_len(), 1);
    }

    #[test]
    fn test_disconnected_consumer() {
        let (sender, _invalidate, buffer) = ReadyBuffer::new(1, Duration::from_millis(5));
        drop(buffer);
        let err = sender.deliver(air_chunk(IVec3::ZERO)).unwrap_err();
        assert_eq!(err, StreamingError::HandoffDisconnected(IVec3::ZERO));
    }

    #[test]
    fn test_invalidations_are_deduplicated() {
        let (sender, invalidate, buffer) = ReadyBuffer::new(1, Duration::from_millis(5));
        let pipeline = Arc::new(TaskPipeline::new("test-post", 1).unwrap());
        let producer = ChunkProducer::new(pipeline, sender, invalidate, ReferencePoint::default());

        producer.invalidate(IVec3::ONE).unwrap();
        producer.clone().invalidate(IVec3::ONE).unwrap();
        producer.invalidate(IVec3::ZERO).unwrap();

        let set = buffer.drain_invalidations();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&IVec3::ONE));
    }

    #[test]
    fn test_receive_chunk_lights_and_delivers() {
        let (sender, invalidate, buffer) = ReadyBuffer::new(8, Duration::from_millis(100));
        let pipeline = Arc::new(TaskPipeline::new("test-post", 1).unwrap());
        let producer = ChunkProducer::new(
            Arc::clone(&pipeline),
            sender,
            invalidate,
            ReferencePoint::new(Vec3::new(8.0, 8.0, 8.0)),
        );

        producer.receive_chunk(air_chunk(IVec3::ZERO)).unwrap();
        assert!(pipeline.wait_idle(Duration::from_secs(5)));

        let ready = buffer.drain_ready();
        assert_eq!(ready.len(), 1);
        assert!(ready[0].is_deflated());
        assert_eq!(ready[0].sunlight(IVec3::new(3, 0, 3)), tessera_shared::MAX_SUNLIGHT);
        assert!(!ready[0].is_ready());
    }
}
