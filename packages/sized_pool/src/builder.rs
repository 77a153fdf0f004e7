use std::alloc::Layout;
use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::{FixedPool, MIN_CELL_SIZE, SLAB_ALIGNMENT};

/// Number of cells per slab used when the builder is not told otherwise.
pub const DEFAULT_CELLS_PER_SLAB: NonZero<usize> = nz!(256);

/// Builder for creating an instance of [`FixedPool`].
///
/// The cell size is mandatory. Use either `.cell_size()` to provide it directly or
/// `.layout()` / `.layout_of::<T>()` to derive it from the memory layout of the objects that
/// will live in the cells. Cells are never smaller than [`MIN_CELL_SIZE`].
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use sized_pool::FixedPool;
///
/// let pool = FixedPool::builder()
///     .cell_size(nz!(48))
///     .cells_per_slab(nz!(1024))
///     .build();
///
/// assert_eq!(pool.cell_size(), 48);
/// assert_eq!(pool.cells_per_slab(), 1024);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[derive(Debug)]
#[must_use]
pub struct FixedPoolBuilder {
    cell_size: Option<NonZero<usize>>,
    cells_per_slab: NonZero<usize>,

    _not_sync: PhantomData<Cell<()>>,
}

impl FixedPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            cell_size: None,
            cells_per_slab: DEFAULT_CELLS_PER_SLAB,
            _not_sync: PhantomData,
        }
    }

    /// Sets the size of each cell in bytes. Sizes below [`MIN_CELL_SIZE`] are raised to it.
    ///
    /// Cells are aligned to the largest power of two that divides both the cell size and
    /// [`SLAB_ALIGNMENT`].
    #[inline]
    pub fn cell_size(mut self, size: NonZero<usize>) -> Self {
        self.cell_size = Some(size.max(nz!(MIN_CELL_SIZE)));
        self
    }

    /// Derives the cell size from a memory layout, so that every cell is large enough and
    /// sufficiently aligned to hold one object of that layout.
    ///
    /// # Panics
    ///
    /// Panics if the layout requires an alignment greater than [`SLAB_ALIGNMENT`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::alloc::Layout;
    ///
    /// use sized_pool::FixedPool;
    ///
    /// // 4-byte objects still get cells big enough for the free list link.
    /// let pool = FixedPool::builder().layout(Layout::new::<u32>()).build();
    /// assert_eq!(pool.cell_size(), 8);
    ///
    /// let pool = FixedPool::builder().layout(Layout::new::<[u32; 3]>()).build();
    /// assert_eq!(pool.cell_size(), 12);
    /// ```
    #[inline]
    pub fn layout(mut self, layout: Layout) -> Self {
        assert!(
            layout.align() <= SLAB_ALIGNMENT,
            "FixedPool cannot guarantee alignment {} beyond the slab alignment of {SLAB_ALIGNMENT}",
            layout.align()
        );

        let size = layout
            .size()
            .max(MIN_CELL_SIZE)
            .checked_next_multiple_of(layout.align())
            .and_then(NonZero::new)
            .expect("a valid layout padded to its own alignment cannot overflow");

        self.cell_size = Some(size);
        self
    }

    /// Derives the cell size from the memory layout of `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` requires an alignment greater than [`SLAB_ALIGNMENT`].
    #[inline]
    pub fn layout_of<T>(self) -> Self {
        self.layout(Layout::new::<T>())
    }

    /// Sets how many cells the pool adds whenever it runs out of free cells.
    ///
    /// Frequently used small cells benefit from large slabs; huge cells are best served by
    /// slabs of a single cell. Defaults to [`DEFAULT_CELLS_PER_SLAB`].
    #[inline]
    pub fn cells_per_slab(mut self, count: NonZero<usize>) -> Self {
        self.cells_per_slab = count;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if no cell size has been set or if one slab would exceed the address space.
    #[must_use]
    #[inline]
    pub fn build(self) -> FixedPool {
        let cell_size = self.cell_size.expect(
            "cell size must be set using .cell_size(), .layout() or .layout_of::<T>() before calling .build()",
        );

        FixedPool::new_inner(cell_size, self.cells_per_slab)
    }
}
