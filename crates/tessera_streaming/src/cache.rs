//! # Chunk Cache
//!
//! Authoritative position -> chunk map. Owned by the consumer; every entry
//! has finished post-processing, ready or not.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_chunk::{Chunk, Neighborhood};
use tessera_shared::{IVec3, Region3, NEIGHBORHOOD_EXTENTS};

/// Map of cached chunks by grid position.
#[derive(Debug, Default)]
pub struct ChunkCache {
    chunks: HashMap<IVec3, Arc<Chunk>>,
}

impl ChunkCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Any cached chunk at `position`.
    #[inline]
    #[must_use]
    pub fn get(&self, position: IVec3) -> Option<&Arc<Chunk>> {
        self.chunks.get(&position)
    }

    /// Cached chunk at `position` if it is ready.
    #[must_use]
    pub fn ready(&self, position: IVec3) -> Option<&Arc<Chunk>> {
        self.get(position).filter(|chunk| chunk.is_ready())
    }

    /// Returns true if `chunk` itself (not a replacement) is cached.
    #[must_use]
    pub fn holds(&self, chunk: &Chunk) -> bool {
        self.get(chunk.position())
            .is_some_and(|cached| cached.id() == chunk.id())
    }

    /// Installs a chunk, returning the entry it replaced.
    pub fn insert(&mut self, chunk: Arc<Chunk>) -> Option<Arc<Chunk>> {
        self.chunks.insert(chunk.position(), chunk)
    }

    /// Removes the entry at `position`.
    pub fn remove(&mut self, position: IVec3) -> Option<Arc<Chunk>> {
        self.chunks.remove(&position)
    }

    /// Number of cached chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of ready chunks.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.chunks.values().filter(|chunk| chunk.is_ready()).count()
    }

    /// Iterates every cached chunk.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.chunks.values()
    }

    /// Snapshot of the 3x3x3 block around `center`, or `None` if any of the 27 is missing.
    #[must_use]
    pub fn neighborhood(&self, center: IVec3) -> Option<Neighborhood> {
        let mut neighborhood = Neighborhood::new(center);
        for position in Region3::from_center_extents(center, NEIGHBORHOOD_EXTENTS).iter() {
            neighborhood.insert(Arc::clone(self.get(position)?));
        }
        Some(neighborhood)
    }
}
