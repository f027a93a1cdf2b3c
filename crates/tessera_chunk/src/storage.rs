//! Per-voxel storage that can be deflated to a single value.
//!
//! Freshly received chunks are dense. Once lighting is final, `deflate`
//! collapses any array whose cells are all equal; most sky chunks end up as
//! a uniform air payload with uniform full sunlight.

use tessera_shared::CHUNK_VOLUME;

/// Dense or uniform array of `CHUNK_VOLUME` cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Storage<T> {
    /// Every cell holds the same value.
    Uniform(T),
    /// One value per cell.
    Dense(Box<[T]>),
}

impl<T: Copy + PartialEq> Storage<T> {
    /// Creates a uniform storage.
    #[must_use]
    pub const fn filled(value: T) -> Self {
        Self::Uniform(value)
    }

    /// Reads a cell. `index` must be below `CHUNK_VOLUME`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> T {
        match self {
            Self::Uniform(value) => *value,
            Self::Dense(cells) => cells[index],
        }
    }

    /// Writes a cell, inflating a uniform storage on the first differing write.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        match self {
            Self::Uniform(current) if *current == value => {}
            Self::Uniform(current) => {
                let mut cells = vec![*current; CHUNK_VOLUME].into_boxed_slice();
                cells[index] = value;
                *self = Self::Dense(cells);
            }
            Self::Dense(cells) => cells[index] = value,
        }
    }

    /// Collapses the storage if every cell is equal. Returns true if it is uniform afterwards.
    pub fn deflate(&mut self) -> bool {
        if let Self::Dense(cells) = self {
            let first = cells[0];
            if cells.iter().all(|cell| *cell == first) {
                *self = Self::Uniform(first);
            }
        }
        self.is_uniform()
    }

    /// Returns true if the storage is collapsed to one value.
    #[inline]
    #[must_use]
    pub const fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform(_))
    }

    /// Heap bytes held by this storage.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        match self {
            Self::Uniform(_) => 0,
            Self::Dense(cells) => std::mem::size_of_val(cells.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_inflates_uniform() {
        let mut storage = Storage::filled(0u8);
        storage.set(5, 0);
        assert!(storage.is_uniform());

        storage.set(5, 7);
        assert!(!storage.is_uniform());
        assert_eq!(storage.get(5), 7);
        assert_eq!(storage.get(6), 0);
    }

    #[test]
    fn test_deflate_only_collapses_equal_cells() {
        let mut storage = Storage::Dense(vec![3u8; CHUNK_VOLUME].into_boxed_slice());
        assert!(storage.deflate());
        assert_eq!(storage.heap_bytes(), 0);

        let mut mixed = Storage::filled(3u8);
        mixed.set(0, 4);
        assert!(!mixed.deflate());
        assert_eq!(mixed.heap_bytes(), CHUNK_VOLUME);
    }
}
