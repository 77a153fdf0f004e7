use std::array;
use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;
use std::ptr::NonNull;
use std::sync::LazyLock;

use crate::{Error, FixedPool, PoolStats, Result, SIZE_CLASS_COUNT, SizeClass};

static GLOBAL: LazyLock<SizeClassRegistry> = LazyLock::new(SizeClassRegistry::new);

/// Serves allocations of arbitrary byte sizes from a fixed table of [`FixedPool`]s, one per
/// [`SizeClass`].
///
/// A request is rounded up to the next power of two (exact powers of two map to themselves)
/// and served by the pool of that class. Because the registry keeps no per-allocation
/// metadata, memory must be returned with exactly the byte size it was allocated with. This
/// sized deallocation contract is the one thing every caller must get right: passing any other
/// size may hand the memory to the wrong pool and corrupt two free lists.
///
/// # Lifetime
///
/// [`global()`][Self::global] is the single process-wide instance, created on first use and
/// never torn down. Components that allocate through a registry take it by shared reference,
/// so tests can substitute a fresh instance from [`new()`][Self::new]. Dropping a registry
/// releases all of its slabs.
///
/// # Examples
///
/// ```
/// use sized_pool::SizeClassRegistry;
///
/// let registry = SizeClassRegistry::new();
///
/// let ptr = registry.allocate(100).unwrap();
///
/// // SAFETY: Freed with the same size it was allocated with, and not used afterwards.
/// unsafe { registry.free(100, ptr) };
///
/// // The 128-byte class hands the same cell out again.
/// assert_eq!(registry.allocate(120).unwrap(), ptr);
/// ```
///
/// # Thread safety
///
/// The registry is thread-safe. Each pool has its own lock, so allocations of different size
/// classes never contend with each other.
#[derive(Debug)]
pub struct SizeClassRegistry {
    /// Indexed by `SizeClass::index()`. Never changes after construction.
    pools: [FixedPool; SIZE_CLASS_COUNT],
}

impl SizeClassRegistry {
    /// Creates a registry with the default slab tuning for every size class.
    ///
    /// No memory is allocated until the first allocation of each size class.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring and constructing a [`SizeClassRegistry`].
    ///
    /// # Examples
    ///
    /// ```
    /// use new_zealand::nz;
    /// use sized_pool::{SizeClass, SizeClassRegistry};
    ///
    /// let class = SizeClass::for_size(64).unwrap();
    ///
    /// let registry = SizeClassRegistry::builder()
    ///     .cells_per_slab(class, nz!(4096))
    ///     .build();
    ///
    /// assert_eq!(registry.pool(class).cells_per_slab(), 4096);
    /// ```
    #[inline]
    pub fn builder() -> SizeClassRegistryBuilder {
        SizeClassRegistryBuilder::new()
    }

    /// The process-wide registry.
    #[must_use]
    #[inline]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Returns the size class that serves `byte_size`, or `None` if no class can serve it.
    #[must_use]
    #[inline]
    pub fn size_class(&self, byte_size: usize) -> Option<SizeClass> {
        SizeClass::for_size(byte_size)
    }

    /// The pool serving the given size class.
    #[must_use]
    #[inline]
    pub fn pool(&self, class: SizeClass) -> &FixedPool {
        self.pools
            .get(class.index())
            .expect("a SizeClass always refers to an existing class")
    }

    /// Snapshots the counters of every pool, from the smallest size class to the largest.
    pub fn stats(&self) -> impl Iterator<Item = (SizeClass, PoolStats)> + '_ {
        SizeClass::all().map(|class| (class, self.pool(class).stats()))
    }

    /// Allocates at least `byte_size` bytes from the pool of the matching size class.
    ///
    /// The memory is aligned to the smaller of the class cell size and
    /// [`SLAB_ALIGNMENT`][crate::SLAB_ALIGNMENT]. Its contents are unspecified.
    ///
    /// # Errors
    ///
    /// * [`Error::SizeTooLarge`] if `byte_size` exceeds the largest size class.
    /// * [`Error::OutOfMemory`] if the pool had to grow and the platform allocator failed.
    pub fn allocate(&self, byte_size: usize) -> Result<NonNull<u8>> {
        let class = SizeClass::for_size(byte_size).ok_or(Error::SizeTooLarge { size: byte_size })?;

        self.pool(class).allocate()
    }

    /// Returns memory obtained from [`allocate()`][Self::allocate].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate()`][Self::allocate] on this registry,
    /// called with exactly this `byte_size`, and must not have been freed since. The memory
    /// must not be accessed afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `byte_size` exceeds the largest size class, as no such allocation can exist.
    pub unsafe fn free(&self, byte_size: usize, ptr: NonNull<u8>) {
        let class = SizeClass::for_size(byte_size).unwrap_or_else(|| {
            panic!("freed {byte_size} bytes but no size class serves that size")
        });

        // SAFETY: Forwarding the caller's guarantee; the same size maps to the same class it
        // was allocated from.
        unsafe { self.pool(class).free(ptr) };
    }
}

impl Default for SizeClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating an instance of [`SizeClassRegistry`].
///
/// Every size class starts with its [default slab tuning][SizeClass::default_cells_per_slab].
#[derive(Debug)]
#[must_use]
pub struct SizeClassRegistryBuilder {
    cells_per_slab: [NonZero<usize>; SIZE_CLASS_COUNT],

    _not_sync: PhantomData<Cell<()>>,
}

impl SizeClassRegistryBuilder {
    fn new() -> Self {
        Self {
            cells_per_slab: array::from_fn(|index| {
                SizeClass::from_index(index)
                    .expect("guarded by array length")
                    .default_cells_per_slab()
            }),
            _not_sync: PhantomData,
        }
    }

    /// Overrides how many cells the pool of `class` adds whenever it grows.
    #[inline]
    pub fn cells_per_slab(mut self, class: SizeClass, count: NonZero<usize>) -> Self {
        *self
            .cells_per_slab
            .get_mut(class.index())
            .expect("a SizeClass always refers to an existing class") = count;
        self
    }

    /// Builds the registry with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if a slab of some class would exceed the address space.
    #[must_use]
    pub fn build(self) -> SizeClassRegistry {
        let pools = array::from_fn(|index| {
            let class = SizeClass::from_index(index).expect("guarded by array length");

            let cell_size = NonZero::new(class.cell_size())
                .expect("cell sizes are never smaller than MIN_CELL_SIZE");

            let cells_per_slab = *self
                .cells_per_slab
                .get(index)
                .expect("guarded by array length");

            FixedPool::builder()
                .cell_size(cell_size)
                .cells_per_slab(cells_per_slab)
                .build()
        });

        SizeClassRegistry { pools }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::SLAB_ALIGNMENT;

    assert_impl_all!(SizeClassRegistry: Send, Sync, std::fmt::Debug);

    #[test]
    fn pools_match_their_classes() {
        let registry = SizeClassRegistry::new();

        for (class, stats) in registry.stats() {
            assert_eq!(stats.cell_size(), class.cell_size());
            assert_eq!(
                stats.cells_per_slab(),
                class.default_cells_per_slab().get()
            );
            assert_eq!(stats.capacity(), 0);
        }
    }

    #[test]
    fn alloc_free_alloc_returns_same_address() {
        let registry = SizeClassRegistry::new();

        for size in [0, 1, 7, 8, 9, 16, 24, 100, 1000, 4096, 5000, 70_000, 1 << 20] {
            let first = registry.allocate(size).unwrap();

            // SAFETY: Same size as allocation, not used afterwards.
            unsafe { registry.free(size, first) };

            let second = registry.allocate(size).unwrap();
            assert_eq!(first, second, "size {size}");

            // SAFETY: Same size as allocation, not used afterwards.
            unsafe { registry.free(size, second) };
        }
    }

    #[test]
    fn sizes_in_one_class_share_a_pool() {
        let registry = SizeClassRegistry::new();

        let ptr = registry.allocate(65).unwrap();

        // SAFETY: Same size as allocation, not used afterwards.
        unsafe { registry.free(65, ptr) };

        // 65 and 128 are both in the 128-byte class.
        let again = registry.allocate(128).unwrap();
        assert_eq!(again, ptr);

        // SAFETY: Same size as allocation, not used afterwards.
        unsafe { registry.free(128, again) };
    }

    #[test]
    fn classes_are_independent() {
        let registry = SizeClassRegistry::new();

        let small = registry.allocate(16).unwrap();
        let large = registry.allocate(256).unwrap();

        let small_class = registry.size_class(16).unwrap();
        let large_class = registry.size_class(256).unwrap();

        assert_eq!(registry.pool(small_class).in_use(), 1);
        assert_eq!(registry.pool(large_class).in_use(), 1);
        assert_eq!(registry.pool(small_class).capacity(), 512);
        assert_eq!(registry.pool(large_class).capacity(), 128);

        // SAFETY: Same size as allocation, not used afterwards.
        unsafe { registry.free(16, small) };
        // SAFETY: Same size as allocation, not used afterwards.
        unsafe { registry.free(256, large) };

        assert_eq!(registry.pool(small_class).in_use(), 0);
        assert_eq!(registry.pool(large_class).in_use(), 0);
    }

    #[test]
    fn memory_is_aligned_for_class() {
        let registry = SizeClassRegistry::new();

        let mut live = Vec::new();

        for size in [8, 16, 32, 64, 128, 1024] {
            for _ in 0..3 {
                let ptr = registry.allocate(size).unwrap();
                assert_eq!(ptr.as_ptr().addr() % size.min(SLAB_ALIGNMENT), 0);
                live.push((size, ptr));
            }
        }

        let unique: HashSet<_> = live.iter().map(|(_, ptr)| *ptr).collect();
        assert_eq!(unique.len(), live.len());

        for (size, ptr) in live {
            // SAFETY: Same size as allocation, not used afterwards.
            unsafe { registry.free(size, ptr) };
        }
    }

    #[test]
    fn too_large_is_error() {
        let registry = SizeClassRegistry::new();

        assert!(matches!(
            registry.allocate(usize::MAX),
            Err(Error::SizeTooLarge { size: usize::MAX })
        ));
        assert_eq!(registry.size_class(usize::MAX), None);
    }

    #[test]
    #[should_panic]
    fn free_too_large_panics() {
        let registry = SizeClassRegistry::new();

        // SAFETY: Panics before touching the pointer.
        unsafe { registry.free(usize::MAX, NonNull::dangling()) };
    }

    #[test]
    fn builder_overrides_one_class() {
        let class = SizeClass::for_size(32).unwrap();
        let other = SizeClass::for_size(64).unwrap();

        let registry = SizeClassRegistry::builder()
            .cells_per_slab(class, nz!(2))
            .build();

        assert_eq!(registry.pool(class).cells_per_slab(), 2);
        assert_eq!(
            registry.pool(other).cells_per_slab(),
            other.default_cells_per_slab().get()
        );

        let a = registry.allocate(32).unwrap();
        let b = registry.allocate(32).unwrap();
        let c = registry.allocate(32).unwrap();
        assert_eq!(registry.pool(class).capacity(), 4);

        for ptr in [a, b, c] {
            // SAFETY: Same size as allocation, not used afterwards.
            unsafe { registry.free(32, ptr) };
        }
    }

    #[test]
    fn global_is_one_instance() {
        assert!(std::ptr::eq(
            SizeClassRegistry::global(),
            SizeClassRegistry::global()
        ));
    }
}
