//! # TESSERA Shared
//!
//! Grid math shared by the chunk payload crate and the streaming core.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on threading, channels or chunk payloads.
//! If you need those, put them in `tessera_chunk` or `tessera_streaming`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;
pub mod region;

pub use constants::{
    chunk_center, chunk_origin, chunk_pos_of_block, chunk_pos_of_world, chunk_region_around_block,
    block_pos_in_chunk, CHUNK_SIZE, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z,
    CHUNK_VOLUME, LOCAL_REGION_EXTENT, MAX_LIGHT, MAX_SUNLIGHT, NEIGHBORHOOD_EXTENTS,
};
pub use math::{IVec3, Vec3};
pub use region::{linear_index, Region3};
