//! # Relevance Scoring
//!
//! Lower score = more relevant. Two scorers exist because the two queues
//! they order want different precision:
//!
//! - `task_score`: integer grid distance, cheap, used for the worker heaps
//! - `ready_score`: float distance to the chunk center, used for the
//!   pending queue where chunks are compared against each other every cycle
//!
//! Scores are never cached; the reference point moves between calls.

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use tessera_shared::{chunk_center, chunk_pos_of_world, IVec3, Vec3};

/// Squared chunk-grid distance between `chunk` and the chunk holding `reference`.
#[inline]
#[must_use]
pub fn task_score(chunk: IVec3, reference: Vec3) -> i64 {
    chunk.distance_squared(chunk_pos_of_world(reference))
}

/// Squared world distance between the center of `chunk` and `reference`.
#[inline]
#[must_use]
pub fn ready_score(chunk: IVec3, reference: Vec3) -> f32 {
    chunk_center(chunk).distance_squared(reference)
}

/// Orders two chunks nearest-first by `ready_score`.
#[inline]
#[must_use]
pub fn compare_nearest(a: IVec3, b: IVec3, reference: Vec3) -> Ordering {
    ready_score(a, reference).total_cmp(&ready_score(b, reference))
}

/// Viewer position shared between the consumer and worker threads.
#[derive(Clone, Debug, Default)]
pub struct ReferencePoint {
    inner: Arc<RwLock<Vec3>>,
}

impl ReferencePoint {
    /// Creates a reference point at `position`.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            inner: Arc::new(RwLock::new(position)),
        }
    }

    /// Current position.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Vec3 {
        *self.inner.read()
    }

    /// Moves the reference point.
    pub fn set(&self, position: Vec3) {
        *self.inner.write() = position;
    }

    /// Chunk containing the reference point.
    #[must_use]
    pub fn chunk(&self) -> IVec3 {
        chunk_pos_of_world(self.get())
    }

    /// `task_score` against the current position.
    #[must_use]
    pub fn task_score(&self, chunk: IVec3) -> i64 {
        task_score(chunk, self.get())
    }
}
