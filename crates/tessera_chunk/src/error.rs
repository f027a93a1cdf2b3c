//! # Chunk Error Types
//!
//! All errors that can occur while building, lighting or compacting a chunk.

use tessera_shared::IVec3;
use thiserror::Error;

/// Errors that can occur in the chunk kernels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// Payload length does not match the chunk layout.
    #[error("invalid payload for chunk {position}: expected {expected} blocks, got {actual}")]
    InvalidPayload {
        /// Chunk the payload was meant for.
        position: IVec3,
        /// Blocks per chunk.
        expected: usize,
        /// Blocks supplied.
        actual: usize,
    },

    /// Attempted to modify a chunk that is already visible.
    #[error("chunk {0} is ready and can no longer be modified")]
    ChunkReady(IVec3),

    /// Attempted to modify a chunk after disposal.
    #[error("chunk {0} has been disposed")]
    ChunkDisposed(IVec3),

    /// A merge needed a neighbor that was not supplied.
    #[error("neighborhood of chunk {center} is missing {missing}")]
    NeighborhoodIncomplete {
        /// Chunk being merged.
        center: IVec3,
        /// First missing neighbor position.
        missing: IVec3,
    },
}

/// Result type for chunk operations.
pub type ChunkResult<T> = Result<T, ChunkError>;
