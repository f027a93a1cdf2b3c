//! # Grid Regions
//!
//! Axis-aligned boxes on the chunk grid. A region is stored as `min + size`
//! and covers the half-open range `[min, min + size)` on every axis.
//!
//! ## Indexing
//!
//! Dense arrays over a region use x-fastest order:
//!
//! ```text
//! index = x + size.x * (y + size.y * z)      (x, y, z relative to min)
//! ```
//!
//! `Region3::iter` yields positions in exactly that order.

use crate::math::IVec3;

/// Half-open box on the integer grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region3 {
    min: IVec3,
    size: IVec3,
}

impl Region3 {
    /// Creates a region from its minimum corner and size.
    ///
    /// Negative sizes are clamped to zero (empty region).
    #[must_use]
    pub fn new(min: IVec3, size: IVec3) -> Self {
        Self {
            min,
            size: IVec3::new(size.x.max(0), size.y.max(0), size.z.max(0)),
        }
    }

    /// Creates a region spanning `center - extents ..= center + extents`.
    #[must_use]
    pub fn from_center_extents(center: IVec3, extents: IVec3) -> Self {
        Self::new(center - extents, extents * 2 + IVec3::ONE)
    }

    /// Creates a region from two inclusive corners.
    #[must_use]
    pub fn from_min_max(min: IVec3, max_inclusive: IVec3) -> Self {
        Self::new(min, max_inclusive - min + IVec3::ONE)
    }

    /// Minimum corner (inclusive).
    #[inline]
    #[must_use]
    pub const fn min(&self) -> IVec3 {
        self.min
    }

    /// Maximum corner (inclusive).
    #[inline]
    #[must_use]
    pub fn max(&self) -> IVec3 {
        self.min + self.size - IVec3::ONE
    }

    /// Extent along each axis.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> IVec3 {
        self.size
    }

    /// Number of grid cells covered.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn volume(&self) -> usize {
        self.size.product() as usize
    }

    /// Returns true if the region covers no cells.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.volume() == 0
    }

    /// Returns true if `pos` lies inside the region.
    #[inline]
    #[must_use]
    pub fn contains(&self, pos: IVec3) -> bool {
        let rel = pos - self.min;
        rel.x >= 0
            && rel.y >= 0
            && rel.z >= 0
            && rel.x < self.size.x
            && rel.y < self.size.y
            && rel.z < self.size.z
    }

    /// Dense index of an absolute position, `None` outside the region.
    #[inline]
    #[must_use]
    pub fn index_of(&self, pos: IVec3) -> Option<usize> {
        if self.contains(pos) {
            Some(linear_index(pos - self.min, self.size))
        } else {
            None
        }
    }

    /// Iterates every position, x fastest, matching `index_of`.
    pub fn iter(&self) -> impl Iterator<Item = IVec3> {
        let Self { min, size } = *self;
        (0..size.z).flat_map(move |z| {
            (0..size.y).flat_map(move |y| (0..size.x).map(move |x| min + IVec3::new(x, y, z)))
        })
    }
}

/// Dense x-fastest index of `rel` inside a box of `size`.
///
/// `rel` must already be inside `[0, size)`.
#[inline]
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn linear_index(rel: IVec3, size: IVec3) -> usize {
    (rel.x + size.x * (rel.y + size.y * rel.z)) as usize
}
