//! # TESSERA Chunk
//!
//! Voxel payloads and the per-chunk kernels the streaming core schedules.
//!
//! ## Core Components
//!
//! - `Block`: 32-bit Pod block with translucency and luminance bits
//! - `Chunk`: 16x16x16 payload with light channels and lifecycle flags
//! - `Storage`: dense or uniform cell array, collapsed by `deflate`
//! - `generate_internal_lighting`: light from the chunk's own blocks
//! - `merge_light` / `merge_into`: light pulled in from the 6 face neighbors
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_chunk::{generate_internal_lighting, Block, Chunk};
//! use tessera_shared::{IVec3, CHUNK_VOLUME};
//!
//! let mut chunk = Chunk::from_blocks(IVec3::ZERO, vec![Block::AIR; CHUNK_VOLUME])?;
//! generate_internal_lighting(&mut chunk);
//! chunk.deflate();
//! assert_eq!(chunk.heap_bytes(), 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod block;
pub mod chunk;
pub mod error;
pub mod lighting;
pub mod storage;

pub use block::{Block, BlockProvider, DefaultBlockProvider};
pub use chunk::{local_index, Chunk, ChunkId, LightData};
pub use error::{ChunkError, ChunkResult};
pub use lighting::{generate_internal_lighting, merge_into, merge_light, Neighborhood, FACES};
pub use storage::Storage;
