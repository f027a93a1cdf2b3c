//! # Blocks
//!
//! A block is a 32-bit Pod value: a type ID plus packed metadata.
//!
//! ```text
//! meta: [ reserved:11 | translucent:1 | luminance:4 ]
//! ```
//!
//! The block-type registry lives outside the streaming core; the only thing
//! the core needs from it is the fill value for out-of-bounds reads, which
//! is what `BlockProvider` supplies.

use bytemuck::{Pod, Zeroable};

/// A single block in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Block {
    /// Block type ID.
    pub id: u16,
    /// Block metadata (luminance, translucency).
    pub meta: u16,
}

impl Block {
    /// Luminance bits of `meta`.
    pub const LUMINANCE_MASK: u16 = 0x000F;
    /// Translucency bit of `meta`.
    pub const TRANSLUCENT: u16 = 0x0010;

    /// Air block (empty, lets light through).
    pub const AIR: Self = Self { id: 0, meta: Self::TRANSLUCENT };
    /// Stone block.
    pub const STONE: Self = Self { id: 2, meta: 0 };
    /// Dirt block.
    pub const DIRT: Self = Self { id: 3, meta: 0 };
    /// Glass block.
    pub const GLASS: Self = Self { id: 20, meta: Self::TRANSLUCENT };
    /// Torch block.
    pub const TORCH: Self = Self { id: 50, meta: Self::TRANSLUCENT | 14 };

    /// Creates an opaque block with given ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self { id, meta: 0 }
    }

    /// Creates a block with ID and metadata.
    #[inline]
    #[must_use]
    pub const fn with_meta(id: u16, meta: u16) -> Self {
        Self { id, meta }
    }

    /// Returns true if this is an air block.
    #[inline]
    #[must_use]
    pub const fn is_air(self) -> bool {
        self.id == 0
    }

    /// Returns true if light passes through this block.
    #[inline]
    #[must_use]
    pub const fn is_translucent(self) -> bool {
        self.meta & Self::TRANSLUCENT != 0
    }

    /// Light emitted by this block (0-15).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn luminance(self) -> u8 {
        (self.meta & Self::LUMINANCE_MASK) as u8
    }
}

/// Supplies block values the core cannot know on its own.
pub trait BlockProvider: Send + Sync {
    /// Block used for reads outside a view's region.
    fn air(&self) -> Block;
}

/// Block provider backed by the built-in `Block::AIR`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBlockProvider;

impl BlockProvider for DefaultBlockProvider {
    fn air(&self) -> Block {
        Block::AIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_flags() {
        assert!(Block::AIR.is_air());
        assert!(Block::AIR.is_translucent());
        assert_eq!(Block::AIR.luminance(), 0);

        assert!(!Block::STONE.is_translucent());
        assert!(Block::TORCH.is_translucent());
        assert_eq!(Block::TORCH.luminance(), 14);
    }

    #[test]
    fn test_block_is_pod() {
        let bytes = bytemuck::bytes_of(&Block::TORCH);
        assert_eq!(bytes.len(), 4);
    }
}
