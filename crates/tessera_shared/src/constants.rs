//! # Chunk Constants
//!
//! Chunk dimensions and the conversions between block space, chunk space
//! and continuous world space.
//!
//! **CRITICAL:** producers and consumers must agree on these values.
//! Chunks received with a different layout are rejected by the chunk crate.

use crate::math::{IVec3, Vec3};
use crate::region::Region3;

// =============================================================================
// CHUNK LAYOUT
// =============================================================================

/// Chunk width in blocks.
pub const CHUNK_SIZE_X: i32 = 16;

/// Chunk height in blocks.
pub const CHUNK_SIZE_Y: i32 = 16;

/// Chunk depth in blocks.
pub const CHUNK_SIZE_Z: i32 = 16;

/// Chunk dimensions as a vector.
pub const CHUNK_SIZE: IVec3 = IVec3::new(CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z);

/// Blocks per chunk.
#[allow(clippy::cast_sign_loss)]
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z) as usize;

/// Extents of the neighborhood a chunk needs before it can be promoted.
pub const NEIGHBORHOOD_EXTENTS: IVec3 = IVec3::ONE;

/// Default chunk radius of a local view around a chunk.
pub const LOCAL_REGION_EXTENT: i32 = 1;

// =============================================================================
// LIGHT
// =============================================================================

/// Brightest sunlight value.
pub const MAX_SUNLIGHT: u8 = 15;

/// Brightest block light value.
pub const MAX_LIGHT: u8 = 15;

// =============================================================================
// COORDINATE CONVERSIONS
// =============================================================================

/// Chunk containing a block position.
#[inline]
#[must_use]
pub const fn chunk_pos_of_block(block: IVec3) -> IVec3 {
    block.div_euclid(CHUNK_SIZE)
}

/// Position of a block inside its chunk.
#[inline]
#[must_use]
pub const fn block_pos_in_chunk(block: IVec3) -> IVec3 {
    block.rem_euclid(CHUNK_SIZE)
}

/// World block position of a chunk's minimum corner.
#[inline]
#[must_use]
pub const fn chunk_origin(chunk: IVec3) -> IVec3 {
    chunk.mul_elem(CHUNK_SIZE)
}

/// Continuous world position of a chunk's center.
#[inline]
#[must_use]
pub fn chunk_center(chunk: IVec3) -> Vec3 {
    chunk_origin(chunk).as_vec3() + CHUNK_SIZE.as_vec3() * 0.5
}

/// Chunk containing a continuous world position (rounded half-up to a block first).
#[inline]
#[must_use]
pub fn chunk_pos_of_world(world: Vec3) -> IVec3 {
    chunk_pos_of_block(world.round_half_up())
}

/// Chunk region covering every block within `extent` of `block`.
///
/// Both corners are inclusive, so the region always contains
/// `chunk_pos_of_block(block)`.
#[must_use]
pub fn chunk_region_around_block(block: IVec3, extent: i32) -> Region3 {
    let min = chunk_pos_of_block(block - IVec3::splat(extent));
    let max = chunk_pos_of_block(block + IVec3::splat(extent));
    Region3::from_min_max(min, max)
}
