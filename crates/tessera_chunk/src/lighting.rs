//! # Light Kernels
//!
//! Two passes run on every chunk before it becomes visible:
//!
//! 1. **Internal lighting** (post-process, chunk still owned): sunlight
//!    enters every translucent block of the top layer, block light starts
//!    at every emitter, both flood through translucent blocks with a
//!    decay of one per step. Full sunlight travelling straight down does
//!    not decay.
//! 2. **Neighbor merge** (chunk shared, neighbors cached): light on the
//!    facing boundary of each of the six face neighbors is pulled across
//!    the border and flooded through the target.
//!
//! The merge only writes the target chunk. Neighbors are read through
//! snapshots taken one at a time, so concurrent merges never hold two
//! locks at once.
//!
//! Light is 6-connected, so only face neighbors contribute. Promotion still
//! waits for all 26 neighbors because edge and corner chunks are needed by
//! downstream consumers of the local view.

use std::collections::VecDeque;
use std::sync::Arc;

use tessera_shared::{
    linear_index, IVec3, Region3, CHUNK_SIZE, MAX_LIGHT, MAX_SUNLIGHT, NEIGHBORHOOD_EXTENTS,
};

use crate::chunk::{local_index, Chunk, LightData};
use crate::error::{ChunkError, ChunkResult};
use crate::storage::Storage;

/// The six face directions.
pub const FACES: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

const DOWN: IVec3 = IVec3::new(0, -1, 0);

/// Size of the 3x3x3 neighborhood grid.
const NEIGHBORHOOD_SIZE: IVec3 = IVec3::new(3, 3, 3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Channel {
    Sun,
    Block,
}

impl Channel {
    /// Value a cell receives from a neighbor holding `value`, travelling along `dir`.
    #[inline]
    fn spread(self, value: u8, dir: IVec3) -> u8 {
        match self {
            Self::Sun if value == MAX_SUNLIGHT && dir == DOWN => MAX_SUNLIGHT,
            Self::Sun | Self::Block => value.saturating_sub(1),
        }
    }
}

/// A chunk plus the cached chunks around it, as seen when a merge began.
#[derive(Clone, Debug)]
pub struct Neighborhood {
    center: IVec3,
    chunks: [Option<Arc<Chunk>>; 27],
}

impl Neighborhood {
    /// Creates an empty neighborhood around `center`.
    #[must_use]
    pub fn new(center: IVec3) -> Self {
        Self {
            center,
            chunks: std::array::from_fn(|_| None),
        }
    }

    /// Position of the center chunk.
    #[inline]
    #[must_use]
    pub const fn center(&self) -> IVec3 {
        self.center
    }

    /// Adds a chunk. Returns false if it lies outside the 3x3x3 block.
    pub fn insert(&mut self, chunk: Arc<Chunk>) -> bool {
        match Self::slot(chunk.position() - self.center) {
            Some(slot) => {
                self.chunks[slot] = Some(chunk);
                true
            }
            None => false,
        }
    }

    /// Chunk at `offset` from the center (each component in -1..=1).
    #[must_use]
    pub fn get(&self, offset: IVec3) -> Option<&Arc<Chunk>> {
        Self::slot(offset).and_then(|slot| self.chunks[slot].as_ref())
    }

    /// Absolute position of the first missing chunk, if any.
    #[must_use]
    pub fn first_missing(&self) -> Option<IVec3> {
        Region3::from_center_extents(self.center, NEIGHBORHOOD_EXTENTS)
            .iter()
            .zip(self.chunks.iter())
            .find(|(_, chunk)| chunk.is_none())
            .map(|(pos, _)| pos)
    }

    /// Returns true if all 27 chunks are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(Option::is_some)
    }

    fn slot(offset: IVec3) -> Option<usize> {
        let rel = offset + NEIGHBORHOOD_EXTENTS;
        Region3::new(IVec3::ZERO, NEIGHBORHOOD_SIZE)
            .contains(rel)
            .then(|| linear_index(rel, NEIGHBORHOOD_SIZE))
    }
}

/// Computes sunlight and block light from the chunk's own blocks.
///
/// The chunk is assumed to be open to the sky; the merge pass corrects
/// this once the chunk above is known.
pub fn generate_internal_lighting(chunk: &mut Chunk) {
    let mut light = std::mem::replace(chunk.light_mut(), LightData::dark());
    let chunk_ref: &Chunk = chunk;

    let mut sun_queue = VecDeque::new();
    let top = Region3::new(
        IVec3::new(0, CHUNK_SIZE.y - 1, 0),
        IVec3::new(CHUNK_SIZE.x, 1, CHUNK_SIZE.z),
    );
    for pos in top.iter() {
        if chunk_ref.block(pos).is_translucent() {
            light.sunlight.set(linear_index(pos, CHUNK_SIZE), MAX_SUNLIGHT);
            sun_queue.push_back(pos);
        }
    }
    propagate(chunk_ref, &mut light.sunlight, sun_queue, Channel::Sun);

    let mut block_queue = VecDeque::new();
    for (index, pos) in Region3::new(IVec3::ZERO, CHUNK_SIZE).iter().enumerate() {
        let luminance = chunk_ref.block_at_index(index).luminance();
        if luminance > 0 {
            light.light.set(index, luminance.min(MAX_LIGHT));
            block_queue.push_back(pos);
        }
    }
    propagate(chunk_ref, &mut light.light, block_queue, Channel::Block);

    *chunk.light_mut() = light;
}

/// Computes the target's light with its face neighbors' boundary light pulled in.
///
/// # Errors
///
/// Returns `NeighborhoodIncomplete` if any of the 27 chunks is missing.
pub fn merge_light(target: &Chunk, neighborhood: &Neighborhood) -> ChunkResult<LightData> {
    if let Some(missing) = neighborhood.first_missing() {
        return Err(ChunkError::NeighborhoodIncomplete {
            center: neighborhood.center(),
            missing,
        });
    }

    let mut light = target.light_snapshot();
    let mut sun_queue = VecDeque::new();
    let mut block_queue = VecDeque::new();

    for face in FACES {
        let neighbor = neighborhood
            .get(face)
            .ok_or(ChunkError::NeighborhoodIncomplete {
                center: neighborhood.center(),
                missing: neighborhood.center() + face,
            })?;
        let neighbor_light = neighbor.light_snapshot();
        let inward = -face;

        for pos in face_slab(face).iter() {
            if !target.block(pos).is_translucent() {
                continue;
            }
            let index = linear_index(pos, CHUNK_SIZE);
            let across = linear_index((pos + face).rem_euclid(CHUNK_SIZE), CHUNK_SIZE);

            let sun = Channel::Sun.spread(neighbor_light.sunlight.get(across), inward);
            if sun > light.sunlight.get(index) {
                light.sunlight.set(index, sun);
                sun_queue.push_back(pos);
            }
            let block = Channel::Block.spread(neighbor_light.light.get(across), inward);
            if block > light.light.get(index) {
                light.light.set(index, block);
                block_queue.push_back(pos);
            }
        }
    }

    propagate(target, &mut light.sunlight, sun_queue, Channel::Sun);
    propagate(target, &mut light.light, block_queue, Channel::Block);
    light.deflate();
    Ok(light)
}

/// Merges neighbor light into a shared chunk.
///
/// # Errors
///
/// Fails if the neighborhood is incomplete or the target is already ready or disposed.
pub fn merge_into(target: &Chunk, neighborhood: &Neighborhood) -> ChunkResult<()> {
    let light = merge_light(target, neighborhood)?;
    target.replace_light(light)
}

/// Boundary layer of the chunk facing `face`.
fn face_slab(face: IVec3) -> Region3 {
    let axis = |dir: i32, size: i32| -> (i32, i32) {
        match dir.signum() {
            1 => (size - 1, 1),
            -1 => (0, 1),
            _ => (0, size),
        }
    };
    let (min_x, size_x) = axis(face.x, CHUNK_SIZE.x);
    let (min_y, size_y) = axis(face.y, CHUNK_SIZE.y);
    let (min_z, size_z) = axis(face.z, CHUNK_SIZE.z);
    Region3::new(IVec3::new(min_x, min_y, min_z), IVec3::new(size_x, size_y, size_z))
}

/// Breadth-first flood of one channel through translucent blocks.
fn propagate(chunk: &Chunk, channel: &mut Storage<u8>, mut queue: VecDeque<IVec3>, kind: Channel) {
    while let Some(pos) = queue.pop_front() {
        let value = channel.get(linear_index(pos, CHUNK_SIZE));
        if value <= 1 {
            continue;
        }
        for face in FACES {
            let next = pos + face;
            let Some(next_index) = local_index(next) else {
                continue;
            };
            if !chunk.block_at_index(next_index).is_translucent() {
                continue;
            }
            let spread = kind.spread(value, face);
            if channel.get(next_index) < spread {
                channel.set(next_index, spread);
                queue.push_back(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use tessera_shared::CHUNK_VOLUME;

    fn solid_chunk(position: IVec3) -> Chunk {
        Chunk::from_blocks(position, vec![Block::STONE; CHUNK_VOLUME]).unwrap()
    }

    fn air_chunk(position: IVec3) -> Chunk {
        Chunk::from_blocks(position, vec![Block::AIR; CHUNK_VOLUME]).unwrap()
    }

    fn full_neighborhood(center: IVec3, make: impl Fn(IVec3) -> Chunk) -> Neighborhood {
        let mut hood = Neighborhood::new(center);
        for pos in Region3::from_center_extents(center, IVec3::ONE).iter() {
            let mut chunk = make(pos);
            generate_internal_lighting(&mut chunk);
            assert!(hood.insert(Arc::new(chunk)));
        }
        hood
    }

    #[test]
    fn test_open_air_is_fully_sunlit() {
        let mut chunk = air_chunk(IVec3::ZERO);
        generate_internal_lighting(&mut chunk);
        assert_eq!(chunk.sunlight(IVec3::new(0, 15, 0)), MAX_SUNLIGHT);
        assert_eq!(chunk.sunlight(IVec3::new(7, 0, 9)), MAX_SUNLIGHT);

        chunk.deflate();
        assert_eq!(chunk.heap_bytes(), 0);
    }

    #[test]
    fn test_sunlight_stops_at_roof() {
        let mut chunk = air_chunk(IVec3::ZERO);
        for x in 0..16 {
            for z in 0..16 {
                chunk.set_block(IVec3::new(x, 10, z), Block::STONE).unwrap();
            }
        }
        generate_internal_lighting(&mut chunk);
        assert_eq!(chunk.sunlight(IVec3::new(3, 11, 3)), MAX_SUNLIGHT);
        assert_eq!(chunk.sunlight(IVec3::new(3, 10, 3)), 0);
        assert_eq!(chunk.sunlight(IVec3::new(3, 5, 3)), 0);
    }

    #[test]
    fn test_sunlight_decays_sideways() {
        let mut chunk = air_chunk(IVec3::ZERO);
        // Roof everywhere except one hole at (0, 10, 0)
        for x in 0..16 {
            for z in 0..16 {
                if (x, z) != (0, 0) {
                    chunk.set_block(IVec3::new(x, 10, z), Block::STONE).unwrap();
                }
            }
        }
        generate_internal_lighting(&mut chunk);
        assert_eq!(chunk.sunlight(IVec3::new(0, 9, 0)), MAX_SUNLIGHT);
        assert_eq!(chunk.sunlight(IVec3::new(0, 0, 0)), MAX_SUNLIGHT);
        assert_eq!(chunk.sunlight(IVec3::new(1, 9, 0)), MAX_SUNLIGHT - 1);
        assert_eq!(chunk.sunlight(IVec3::new(3, 9, 0)), MAX_SUNLIGHT - 3);
    }

    #[test]
    fn test_torch_light_falls_off() {
        let mut chunk = solid_chunk(IVec3::ZERO);
        for x in 0..16 {
            chunk.set_block(IVec3::new(x, 4, 4), Block::AIR).unwrap();
        }
        chunk.set_block(IVec3::new(0, 4, 4), Block::TORCH).unwrap();
        generate_internal_lighting(&mut chunk);

        assert_eq!(chunk.light(IVec3::new(0, 4, 4)), 14);
        assert_eq!(chunk.light(IVec3::new(5, 4, 4)), 9);
        assert_eq!(chunk.light(IVec3::new(14, 4, 4)), 0);
        assert!(chunk.light(IVec3::new(0, 5, 4)) == 0, "stone does not carry light");
    }

    #[test]
    fn test_neighborhood_slots() {
        let center = IVec3::new(4, -2, 7);
        let mut hood = Neighborhood::new(center);
        assert_eq!(hood.first_missing(), Some(center - IVec3::ONE));
        assert!(hood.insert(Arc::new(Chunk::new(center + IVec3::new(1, 0, -1)))));
        assert!(!hood.insert(Arc::new(Chunk::new(center + IVec3::new(2, 0, 0)))));
        assert!(hood.get(IVec3::new(1, 0, -1)).is_some());
        assert!(hood.get(IVec3::ZERO).is_none());
        assert!(!hood.is_complete());
    }

    #[test]
    fn test_merge_requires_full_neighborhood() {
        let chunk = Arc::new(air_chunk(IVec3::ZERO));
        let mut hood = Neighborhood::new(IVec3::ZERO);
        hood.insert(Arc::clone(&chunk));
        let err = merge_light(&chunk, &hood).unwrap_err();
        assert!(matches!(err, ChunkError::NeighborhoodIncomplete { center, .. } if center == IVec3::ZERO));
    }

    #[test]
    fn test_merge_pulls_light_across_border() {
        // Center is a dark cave with one air corridor along x; the chunk to
        // the west carries a torch right at the shared border.
        let center = IVec3::ZERO;
        let hood = full_neighborhood(center, |pos| {
            let mut chunk = solid_chunk(pos);
            for x in 0..16 {
                chunk.set_block(IVec3::new(x, 4, 4), Block::AIR).unwrap();
            }
            if pos == IVec3::new(-1, 0, 0) {
                chunk.set_block(IVec3::new(15, 4, 4), Block::TORCH).unwrap();
            }
            chunk
        });
        let target = Arc::clone(hood.get(IVec3::ZERO).unwrap());
        assert_eq!(target.light(IVec3::new(0, 4, 4)), 0);

        merge_into(&target, &hood).unwrap();
        assert_eq!(target.light(IVec3::new(0, 4, 4)), 13);
        assert_eq!(target.light(IVec3::new(3, 4, 4)), 10);
        assert_eq!(target.sunlight(IVec3::new(0, 4, 4)), 0);
    }

    #[test]
    fn test_merge_darkens_nothing() {
        let hood = full_neighborhood(IVec3::ZERO, air_chunk);
        let target = Arc::clone(hood.get(IVec3::ZERO).unwrap());
        let before = target.light_snapshot();
        merge_into(&target, &hood).unwrap();
        let after = target.light_snapshot();
        for i in 0..CHUNK_VOLUME {
            assert!(after.sunlight.get(i) >= before.sunlight.get(i));
            assert!(after.light.get(i) >= before.light.get(i));
        }
    }

    #[test]
    fn test_merge_refuses_ready_chunk() {
        let hood = full_neighborhood(IVec3::ZERO, air_chunk);
        let target = Arc::clone(hood.get(IVec3::ZERO).unwrap());
        target.mark_ready();
        assert_eq!(merge_into(&target, &hood), Err(ChunkError::ChunkReady(IVec3::ZERO)));
    }
}
