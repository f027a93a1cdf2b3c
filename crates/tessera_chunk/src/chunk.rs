//! # Chunk System
//!
//! World data is organized into fixed-size 16x16x16 chunks on an integer
//! grid. A chunk is identified by its grid position plus a process-unique
//! `ChunkId`, so two deliveries for the same position never compare equal.
//!
//! ## Lifecycle
//!
//! ```text
//! Chunk::from_blocks ──> internal lighting ──> deflate ──> shared (Arc)
//!      (owned, &mut)         (owned, &mut)                    │
//!                                                             ▼
//!                               merge job writes light ──> mark_ready ──> dispose
//! ```
//!
//! Blocks are frozen once the chunk is shared. Light stays writable behind a
//! lock until `mark_ready`; after that the only transition left is
//! `dispose`. Both flags flip exactly once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tessera_shared::{linear_index, IVec3, CHUNK_SIZE, CHUNK_VOLUME};

use crate::block::Block;
use crate::error::{ChunkError, ChunkResult};
use crate::storage::Storage;

static NEXT_CHUNK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one chunk delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u64);

impl ChunkId {
    fn next() -> Self {
        Self(NEXT_CHUNK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, for logging.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Sunlight and block light channels of a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightData {
    /// Sunlight per block (0-15).
    pub sunlight: Storage<u8>,
    /// Block light per block (0-15).
    pub light: Storage<u8>,
}

impl LightData {
    /// Completely dark light data.
    #[must_use]
    pub const fn dark() -> Self {
        Self {
            sunlight: Storage::filled(0),
            light: Storage::filled(0),
        }
    }

    /// Collapses both channels where possible.
    pub fn deflate(&mut self) {
        self.sunlight.deflate();
        self.light.deflate();
    }
}

/// Index of a local block position, `None` outside the chunk.
#[inline]
#[must_use]
pub fn local_index(local: IVec3) -> Option<usize> {
    let inside = local.x >= 0
        && local.y >= 0
        && local.z >= 0
        && local.x < CHUNK_SIZE.x
        && local.y < CHUNK_SIZE.y
        && local.z < CHUNK_SIZE.z;
    inside.then(|| linear_index(local, CHUNK_SIZE))
}

/// A chunk of world data.
///
/// Contains a 16x16x16 grid of blocks plus light and lifecycle flags.
#[derive(Debug)]
pub struct Chunk {
    id: ChunkId,
    position: IVec3,
    /// Block data (x-fastest, see `tessera_shared::region`).
    blocks: Storage<Block>,
    light: RwLock<LightData>,
    deflated: bool,
    ready: AtomicBool,
    disposed: AtomicBool,
}

impl Chunk {
    /// Creates a new empty (all air, dark) chunk at the given position.
    #[must_use]
    pub fn new(position: IVec3) -> Self {
        Self {
            id: ChunkId::next(),
            position,
            blocks: Storage::filled(Block::AIR),
            light: RwLock::new(LightData::dark()),
            deflated: false,
            ready: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Creates a chunk from a dense block payload (x-fastest order).
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if the payload does not hold exactly
    /// `CHUNK_VOLUME` blocks.
    pub fn from_blocks(position: IVec3, blocks: Vec<Block>) -> ChunkResult<Self> {
        if blocks.len() != CHUNK_VOLUME {
            return Err(ChunkError::InvalidPayload {
                position,
                expected: CHUNK_VOLUME,
                actual: blocks.len(),
            });
        }
        let mut chunk = Self::new(position);
        chunk.blocks = Storage::Dense(blocks.into_boxed_slice());
        Ok(chunk)
    }

    /// Identity of this delivery.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ChunkId {
        self.id
    }

    /// Grid position of the chunk.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> IVec3 {
        self.position
    }

    /// Gets a block at local coordinates. Outside the chunk reads as air.
    #[inline]
    #[must_use]
    pub fn block(&self, local: IVec3) -> Block {
        local_index(local).map_or(Block::AIR, |i| self.blocks.get(i))
    }

    /// Gets a block by dense index.
    #[inline]
    #[must_use]
    pub fn block_at_index(&self, index: usize) -> Block {
        self.blocks.get(index)
    }

    /// Sets a block at local coordinates.
    ///
    /// # Errors
    ///
    /// Fails if the chunk is ready or disposed. Writes outside the chunk are ignored.
    pub fn set_block(&mut self, local: IVec3, block: Block) -> ChunkResult<()> {
        self.ensure_mutable()?;
        if let Some(i) = local_index(local) {
            self.blocks.set(i, block);
            self.deflated = false;
        }
        Ok(())
    }

    /// Sunlight at local coordinates (0 outside the chunk).
    #[must_use]
    pub fn sunlight(&self, local: IVec3) -> u8 {
        local_index(local).map_or(0, |i| self.light.read().sunlight.get(i))
    }

    /// Block light at local coordinates (0 outside the chunk).
    #[must_use]
    pub fn light(&self, local: IVec3) -> u8 {
        local_index(local).map_or(0, |i| self.light.read().light.get(i))
    }

    /// Copies both light channels.
    #[must_use]
    pub fn light_snapshot(&self) -> LightData {
        self.light.read().clone()
    }

    /// Exclusive access to the light channels while the chunk is still owned.
    pub fn light_mut(&mut self) -> &mut LightData {
        self.light.get_mut()
    }

    /// Replaces the light of a shared, not yet ready chunk.
    ///
    /// # Errors
    ///
    /// Fails if the chunk is ready or disposed.
    pub fn replace_light(&self, light: LightData) -> ChunkResult<()> {
        self.ensure_mutable()?;
        *self.light.write() = light;
        Ok(())
    }

    /// Compacts block and light storage. Call once lighting is final.
    pub fn deflate(&mut self) {
        self.blocks.deflate();
        self.light.get_mut().deflate();
        self.deflated = true;
    }

    /// Returns true if `deflate` ran since the last block edit.
    #[inline]
    #[must_use]
    pub const fn is_deflated(&self) -> bool {
        self.deflated
    }

    /// Heap bytes held by block and light storage.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        let light = self.light.read();
        self.blocks.heap_bytes() + light.sunlight.heap_bytes() + light.light.heap_bytes()
    }

    /// Returns true once the chunk has been promoted.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Promotes the chunk. Returns false if it was already ready or is disposed.
    pub fn mark_ready(&self) -> bool {
        if self.is_disposed() {
            tracing::warn!(chunk = %self.position, id = self.id.0, "refusing to mark a disposed chunk ready");
            return false;
        }
        self.ready
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns true once the chunk has been disposed.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Disposes the chunk. Returns false (and does nothing) on a second call.
    ///
    /// Data stays readable for views that still hold the chunk; it is freed
    /// when the last reference drops.
    pub fn dispose(&self) -> bool {
        let first = !self.disposed.swap(true, Ordering::AcqRel);
        if !first {
            tracing::debug!(chunk = %self.position, id = self.id.0, "chunk disposed twice");
        }
        first
    }

    fn ensure_mutable(&self) -> ChunkResult<()> {
        if self.is_disposed() {
            return Err(ChunkError::ChunkDisposed(self.position));
        }
        if self.is_ready() {
            return Err(ChunkError::ChunkReady(self.position));
        }
        Ok(())
    }
}
