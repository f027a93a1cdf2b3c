//! # Streaming Error Types
//!
//! All errors that can occur between the producer, the worker pools and
//! the consumer. None of them ever reach a query: missing data is `None`.

use tessera_chunk::ChunkError;
use tessera_shared::IVec3;
use thiserror::Error;

/// Errors that can occur in the streaming core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamingError {
    /// Invalid configuration value or file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration {path}: {reason}")]
    ConfigIo {
        /// File that was requested.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// A task was submitted after the pipeline stopped.
    #[error("pipeline {0} is shut down")]
    PipelineShutDown(String),

    /// A worker thread could not be started.
    #[error("failed to spawn worker for pipeline {pipeline}: {reason}")]
    WorkerSpawn {
        /// Pipeline name.
        pipeline: String,
        /// OS error text.
        reason: String,
    },

    /// The consumer side of the ready queue is gone.
    #[error("ready queue disconnected, dropped chunk {0}")]
    HandoffDisconnected(IVec3),

    /// The ready queue stayed full for the whole handoff wait.
    #[error("ready queue full, dropped chunk {0}")]
    HandoffTimeout(IVec3),

    /// A merge job returned an error or panicked.
    #[error("merge for chunk {position} failed: {reason}")]
    MergeFailed {
        /// Chunk being merged.
        position: IVec3,
        /// Failure description.
        reason: String,
    },

    /// A merge job was dropped before it ran.
    #[error("merge for chunk {0} was cancelled")]
    MergeCancelled(IVec3),

    /// The world-event receiver was dropped.
    #[error("world event sink closed")]
    EventSinkClosed,

    /// The world-event channel is full.
    #[error("world event sink full")]
    EventSinkFull,
}

/// Result type for streaming operations.
pub type StreamingResult<T> = Result<T, StreamingError>;

/// Failure reported by a pipeline task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// A chunk kernel rejected the work.
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// Handing the result to the consumer failed.
    #[error(transparent)]
    Streaming(#[from] StreamingError),
}
