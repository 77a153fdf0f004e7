use std::num::NonZero;

use new_zealand::nz;

use crate::MIN_CELL_SIZE;

/// Number of size classes served by a [`SizeClassRegistry`][crate::SizeClassRegistry].
///
/// Class `i` serves cells of `2^i` bytes (but never less than [`MIN_CELL_SIZE`]). On 64-bit
/// targets the largest class serves 64 GiB; narrower targets stop at the largest power of two
/// that fits in `usize`.
pub const SIZE_CLASS_COUNT: usize = if usize::BITS >= 64 {
    37
} else {
    usize::BITS as usize
};

/// Maps a byte size to the index of the smallest power of two that is not smaller than it.
///
/// Exact powers of two map to their own exponent, everything else rounds up. Zero is treated
/// like one. The mapping is monotonic: a larger size never maps to a smaller index.
///
/// The result may be [`SIZE_CLASS_COUNT`] or more for sizes that no class can serve.
///
/// # Examples
///
/// ```
/// use sized_pool::size_class_index;
///
/// assert_eq!(size_class_index(16), 4);
/// assert_eq!(size_class_index(17), 5);
/// assert_eq!(size_class_index(32), 5);
/// ```
#[must_use]
#[inline]
pub const fn size_class_index(byte_size: usize) -> usize {
    if byte_size <= 1 {
        return 0;
    }

    let highest_bit = byte_size.ilog2() as usize;

    if byte_size.is_power_of_two() {
        highest_bit
    } else {
        // Cannot overflow, ilog2 of a usize is at most 63.
        highest_bit.wrapping_add(1)
    }
}

/// A canonical bucket of byte sizes, all served by one pool of a registry.
///
/// # Examples
///
/// ```
/// use sized_pool::SizeClass;
///
/// let class = SizeClass::for_size(100).unwrap();
/// assert_eq!(class.index(), 7);
/// assert_eq!(class.cell_size(), 128);
///
/// // Everything up to 8 bytes shares the minimum cell size.
/// assert_eq!(SizeClass::for_size(3).unwrap().cell_size(), 8);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SizeClass {
    index: usize,
}

impl SizeClass {
    /// Returns the size class that serves allocations of `byte_size` bytes, or `None` if the
    /// size exceeds the largest class.
    #[must_use]
    #[inline]
    pub const fn for_size(byte_size: usize) -> Option<Self> {
        Self::from_index(size_class_index(byte_size))
    }

    /// Returns the size class with the given index, or `None` if there is no such class.
    #[must_use]
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < SIZE_CLASS_COUNT {
            Some(Self { index })
        } else {
            None
        }
    }

    /// Iterates over all size classes from the smallest to the largest.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..SIZE_CLASS_COUNT).map(|index| Self { index })
    }

    /// The position of this class in the registry's table.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.index
    }

    /// The size in bytes of every cell in this class.
    #[must_use]
    #[inline]
    pub const fn cell_size(self) -> usize {
        let size = 1_usize << self.index;

        if size < MIN_CELL_SIZE {
            MIN_CELL_SIZE
        } else {
            size
        }
    }

    /// How many cells a slab of this class holds unless configured otherwise.
    ///
    /// Small, frequently used classes get large slabs. From 1 MiB upwards every cell gets a
    /// slab of its own, which makes the pool a cache of previously allocated blocks.
    #[must_use]
    pub const fn default_cells_per_slab(self) -> NonZero<usize> {
        match self.index {
            4..=7 => nz!(512),
            8..=11 => nz!(128),
            12..=15 => nz!(32),
            16..=19 => nz!(8),
            _ => nz!(1),
        }
    }
}
