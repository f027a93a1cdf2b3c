//! # Region Views
//!
//! An immutable window over a box of cached chunks.
//!
//! Block coordinates passed to a view are view-relative. The `offset` (in
//! chunks) says which region-relative chunk holds view block `(0, 0, 0)`:
//!
//! - local view around `c`: region `c ± e`, offset `e`, so view space
//!   starts at the center chunk's origin
//! - views built with offset `-region.min` use world block coordinates
//!
//! A view holds `Arc`s to its chunks. Later cache inserts or evictions are
//! not observed, and a disposed chunk stays readable for as long as a view
//! references it.

use std::sync::Arc;

use tessera_chunk::{Block, Chunk};
use tessera_shared::{
    block_pos_in_chunk, chunk_origin, chunk_pos_of_block, IVec3, Region3, CHUNK_SIZE,
};

/// Read-only snapshot of a region of chunks.
#[derive(Clone, Debug)]
pub struct RegionView {
    region: Region3,
    offset: IVec3,
    chunks: Vec<Arc<Chunk>>,
    air: Block,
}

impl RegionView {
    /// Builds a view, or returns `None` if `lookup` misses any position of `region`.
    pub fn build(
        region: Region3,
        offset: IVec3,
        air: Block,
        lookup: impl FnMut(IVec3) -> Option<Arc<Chunk>>,
    ) -> Option<Self> {
        let chunks = region.iter().map(lookup).collect::<Option<Vec<_>>>()?;
        Some(Self {
            region,
            offset,
            chunks,
            air,
        })
    }

    /// Chunk region covered, in absolute chunk coordinates.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> Region3 {
        self.region
    }

    /// Chunk offset from view space to region-relative space.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> IVec3 {
        self.offset
    }

    /// Chunks in x-fastest order.
    #[must_use]
    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    /// Chunk at a region-relative position.
    #[must_use]
    pub fn chunk_at_relative(&self, relative: IVec3) -> Option<&Arc<Chunk>> {
        self.region
            .index_of(self.region.min() + relative)
            .map(|index| &self.chunks[index])
    }

    /// View-space block region that `block` and friends resolve.
    #[must_use]
    pub fn block_region(&self) -> Region3 {
        Region3::new(
            -chunk_origin(self.offset),
            self.region.size().mul_elem(CHUNK_SIZE),
        )
    }

    /// Returns true if `pos` falls inside the view.
    #[must_use]
    pub fn is_valid_block(&self, pos: IVec3) -> bool {
        self.block_region().contains(pos)
    }

    /// Block at a view-space position. Outside the view reads as air.
    #[must_use]
    pub fn block(&self, pos: IVec3) -> Block {
        self.resolve(pos)
            .map_or(self.air, |(chunk, local)| chunk.block(local))
    }

    /// Sunlight at a view-space position (0 outside).
    #[must_use]
    pub fn sunlight(&self, pos: IVec3) -> u8 {
        self.resolve(pos).map_or(0, |(chunk, local)| chunk.sunlight(local))
    }

    /// Block light at a view-space position (0 outside).
    #[must_use]
    pub fn light(&self, pos: IVec3) -> u8 {
        self.resolve(pos).map_or(0, |(chunk, local)| chunk.light(local))
    }

    /// World block position of a view-space position.
    #[must_use]
    pub fn to_world_block(&self, pos: IVec3) -> IVec3 {
        pos + chunk_origin(self.region.min() + self.offset)
    }

    fn resolve(&self, pos: IVec3) -> Option<(&Arc<Chunk>, IVec3)> {
        let relative = chunk_pos_of_block(pos) + self.offset;
        self.chunk_at_relative(relative)
            .map(|chunk| (chunk, block_pos_in_chunk(pos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cache_around(center: IVec3) -> HashMap<IVec3, Arc<Chunk>> {
        Region3::from_center_extents(center, IVec3::ONE)
            .iter()
            .map(|pos| {
                let mut chunk = Chunk::new(pos);
                // Mark each chunk by a distinct block at its local origin
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let id = (pos.x + 10 + (pos.y + 10) * 32 + (pos.z + 10) * 1024) as u16;
                chunk.set_block(IVec3::ZERO, Block::new(id)).unwrap();
                (pos, Arc::new(chunk))
            })
            .collect()
    }

    fn local_view(cache: &HashMap<IVec3, Arc<Chunk>>, center: IVec3) -> Option<RegionView> {
        let region = Region3::from_center_extents(center, IVec3::ONE);
        RegionView::build(region, IVec3::ONE, Block::AIR, |pos| cache.get(&pos).cloned())
    }

    #[test]
    fn test_missing_chunk_gives_none() {
        let mut cache = cache_around(IVec3::ZERO);
        assert!(local_view(&cache, IVec3::ZERO).is_some());
        cache.remove(&IVec3::new(-1, 1, 0));
        assert!(local_view(&cache, IVec3::ZERO).is_none());
    }

    #[test]
    fn test_local_view_origin_is_center_chunk() {
        let center = IVec3::new(5, -3, 2);
        let cache = cache_around(center);
        let view = local_view(&cache, center).unwrap();

        assert_eq!(view.block(IVec3::ZERO), cache[&center].block(IVec3::ZERO));
        assert_eq!(
            view.block(IVec3::new(-16, 0, 16)),
            cache[&(center + IVec3::new(-1, 0, 1))].block(IVec3::ZERO)
        );
        assert_eq!(view.to_world_block(IVec3::new(1, 2, 3)), chunk_origin(center) + IVec3::new(1, 2, 3));
        assert!(view.is_valid_block(IVec3::new(-16, -16, -16)));
        assert!(view.is_valid_block(IVec3::new(31, 31, 31)));
        assert!(!view.is_valid_block(IVec3::new(32, 0, 0)));
        assert_eq!(view.block(IVec3::new(32, 0, 0)), Block::AIR);
    }

    #[test]
    fn test_world_space_view() {
        let center = IVec3::new(-2, 0, 7);
        let cache = cache_around(center);
        let region = Region3::from_center_extents(center, IVec3::ONE);
        let view = RegionView::build(region, -region.min(), Block::AIR, |pos| cache.get(&pos).cloned())
            .unwrap();

        for pos in region.iter() {
            let world = chunk_origin(pos);
            assert_eq!(view.block(world), cache[&pos].block(IVec3::ZERO));
            assert_eq!(view.to_world_block(world), world);
        }
        assert_eq!(view.chunks().len(), 27);
        assert_eq!(
            view.chunk_at_relative(IVec3::ZERO).unwrap().position(),
            region.min()
        );
    }

    #[test]
    fn test_view_is_a_snapshot() {
        let mut cache = cache_around(IVec3::ZERO);
        let view = local_view(&cache, IVec3::ZERO).unwrap();
        let evicted = cache.remove(&IVec3::ZERO).unwrap();
        evicted.dispose();
        drop(evicted);
        assert_eq!(view.chunk_at_relative(IVec3::ONE).unwrap().position(), IVec3::ZERO);
        assert_eq!(view.block(IVec3::ZERO).id, 10 + 10 * 32 + 10 * 1024);
    }
}
