//! Post-processed chunks waiting for their neighborhood.
//!
//! Sorted farthest-first every cycle, then scanned back to front so the
//! nearest chunks try to promote first. A chunk that begins a merge is
//! removed with `swap_remove`; the element moved into its slot has already
//! been visited, so every chunk is tried exactly once per scan.

use std::sync::Arc;

use tessera_chunk::{Chunk, ChunkId};
use tessera_shared::Vec3;

use crate::relevance::compare_nearest;

/// Chunks cached but not yet promoted.
#[derive(Debug, Default)]
pub struct PendingQueue {
    chunks: Vec<Arc<Chunk>>,
}

impl PendingQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chunk.
    pub fn push(&mut self, chunk: Arc<Chunk>) {
        self.chunks.push(chunk);
    }

    /// Removes the chunk with identity `id`. Returns true if it was queued.
    pub fn remove(&mut self, id: ChunkId) -> bool {
        match self.chunks.iter().position(|chunk| chunk.id() == id) {
            Some(index) => {
                self.chunks.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Sorts farthest-first relative to `reference`.
    pub fn sort_farthest_first(&mut self, reference: Vec3) {
        self.chunks
            .sort_by(|a, b| compare_nearest(b.position(), a.position(), reference));
    }

    /// Walks the queue back to front, removing every chunk `try_promote` accepts.
    ///
    /// Returns the number of chunks removed.
    pub fn promote_back_to_front(&mut self, mut try_promote: impl FnMut(&Arc<Chunk>) -> bool) -> usize {
        let mut promoted = 0;
        let mut index = self.chunks.len();
        while index > 0 {
            index -= 1;
            if try_promote(&self.chunks[index]) {
                self.chunks.swap_remove(index);
                promoted += 1;
            }
        }
        promoted
    }

    /// Number of queued chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterates the queue in its current order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.chunks.iter()
    }
}
