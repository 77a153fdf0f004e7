use std::collections::BTreeMap;
use std::mem;
use std::num::NonZero;
use std::ptr::NonNull;

use nm::Event;

use crate::metrics::{CELLS_FREED, CELLS_REUSED, SLABS_ALLOCATED_BYTES};
use crate::spin_mutex::SpinMutex;
use crate::{FixedPoolBuilder, Region, Result, aligned};

/// Alignment of every slab obtained from the platform allocator.
///
/// A cell at offset `i * cell_size` inside a slab is therefore aligned to the largest power of
/// two that divides both `cell_size` and this value.
pub const SLAB_ALIGNMENT: usize = 32;

/// The smallest cell a pool can hand out. Every free cell must be able to hold the link to the
/// next free cell.
pub const MIN_CELL_SIZE: usize = size_of::<FreeNode>();

/// The overlay we place on a cell while it is on the free list.
///
/// Only ever read and written through unaligned accesses, as cells whose size is not a
/// multiple of the pointer alignment place their links at unaligned addresses.
#[repr(C)]
struct FreeNode {
    next: Option<NonNull<FreeNode>>,
}

impl FreeNode {
    /// # Safety
    ///
    /// The cell must be a free cell of a pool, i.e. it must contain a `FreeNode`.
    unsafe fn next(cell: NonNull<Self>) -> Option<NonNull<Self>> {
        // SAFETY: Forwarding the caller's guarantee that the cell holds a `FreeNode`.
        unsafe { cell.as_ptr().read_unaligned().next }
    }

    /// # Safety
    ///
    /// The cell must be at least `MIN_CELL_SIZE` bytes, valid for writes and not in use.
    unsafe fn link(cell: NonNull<Self>, next: Option<NonNull<Self>>) {
        // SAFETY: Forwarding the caller's guarantee that the cell is writable and unused.
        unsafe { cell.as_ptr().write_unaligned(Self { next }) };
    }
}

/// Everything in a pool that changes after construction, guarded by the pool's lock.
#[derive(Debug)]
struct PoolState {
    /// Head of the intrusive free list. Think of this as a stack of the most recently freed
    /// cells, with the stack entries stored in the cells themselves.
    head: Option<NonNull<FreeNode>>,

    /// Every slab we ever allocated, keyed by base address so a cell can be traced back to its
    /// slab. We never give them back while the pool is alive.
    slabs: BTreeMap<usize, Region>,

    /// Total number of cells across all slabs.
    capacity: usize,

    /// Number of cells currently handed out to callers.
    in_use: usize,
}

// SAFETY: The raw pointers refer to slab memory owned by the pool, not to anything tied to
// the thread that created them, so the state can move between threads.
unsafe impl Send for PoolState {}

/// A free-list allocator for cells of one fixed size.
///
/// The pool grows by allocating slabs of [`cells_per_slab()`][Self::cells_per_slab] cells from
/// the platform allocator and threading a free list through them. Allocation pops the head
/// of the free list, freeing pushes the cell back onto the head, so the most recently freed
/// cell is always the next one handed out.
///
/// Slabs are never returned to the platform allocator while the pool is alive; the capacity
/// of a pool only ever grows. Dropping the pool releases all of its slabs, at which point any
/// cells still in use become dangling.
///
/// Each slab costs the pool one bookkeeping entry (its [`Region`] plus a map node) on top of
/// the slab itself. With large slabs this is negligible, but a pool with one cell per slab
/// pays it for every cell, which for small cells is more than the cell. Prefer several cells
/// per slab for small cell sizes.
///
/// # Examples
///
/// ```
/// use sized_pool::FixedPool;
/// use new_zealand::nz;
///
/// let pool = FixedPool::builder()
///     .cell_size(nz!(16))
///     .cells_per_slab(nz!(4))
///     .build();
///
/// let cell = pool.allocate().unwrap();
/// assert_eq!(pool.capacity(), 4);
/// assert_eq!(pool.in_use(), 1);
///
/// // SAFETY: The cell came from this pool and is not used after being freed.
/// unsafe { pool.free(cell) };
/// assert_eq!(pool.in_use(), 0);
///
/// // The freed cell is the first to be reused.
/// assert_eq!(pool.allocate().unwrap(), cell);
/// ```
///
/// # Thread safety
///
/// The pool is thread-safe ([`Send`] and [`Sync`]). Operations are serialized by a short-hold
/// spin lock that only guards a few pointer operations (plus one platform allocation whenever
/// the pool grows).
#[derive(Debug)]
pub struct FixedPool {
    cell_size: NonZero<usize>,
    cells_per_slab: NonZero<usize>,

    /// `cell_size * cells_per_slab`, validated once at construction.
    slab_size: usize,

    state: SpinMutex<PoolState>,
}

/// A point-in-time snapshot of the counters of a [`FixedPool`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolStats {
    cell_size: usize,
    cells_per_slab: usize,
    slab_count: usize,
    capacity: usize,
    in_use: usize,
}

impl PoolStats {
    /// Size in bytes of each cell handed out by the pool.
    #[must_use]
    pub fn cell_size(&self) -> usize {
        self.cell_size
    }

    /// Number of cells added to the pool whenever it grows.
    #[must_use]
    pub fn cells_per_slab(&self) -> usize {
        self.cells_per_slab
    }

    /// Number of slabs the pool has allocated.
    #[must_use]
    pub fn slab_count(&self) -> usize {
        self.slab_count
    }

    /// Total number of cells in the pool, used or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cells currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Number of cells waiting on the free list.
    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity.wrapping_sub(self.in_use)
    }
}

impl FixedPool {
    /// Creates a builder for configuring and constructing a [`FixedPool`].
    ///
    /// A cell size is mandatory, specified via `.cell_size()`, `.layout()` or `.layout_of::<T>()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sized_pool::FixedPool;
    ///
    /// let pool = FixedPool::builder().layout_of::<[u64; 3]>().build();
    /// assert_eq!(pool.cell_size(), 24);
    /// ```
    #[inline]
    pub fn builder() -> FixedPoolBuilder {
        FixedPoolBuilder::new()
    }

    /// # Panics
    ///
    /// Panics if the cell size is smaller than [`MIN_CELL_SIZE`] or if a slab would not fit
    /// into the address space.
    #[must_use]
    pub(crate) fn new_inner(cell_size: NonZero<usize>, cells_per_slab: NonZero<usize>) -> Self {
        assert!(
            cell_size.get() >= MIN_CELL_SIZE,
            "FixedPool cell size {cell_size} is smaller than the minimum of {MIN_CELL_SIZE}"
        );

        let slab_size = cell_size
            .get()
            .checked_mul(cells_per_slab.get())
            .unwrap_or_else(|| {
                panic!("slab of {cells_per_slab} cells of {cell_size} bytes exceeds virtual memory")
            });

        Self {
            cell_size,
            cells_per_slab,
            slab_size,
            state: SpinMutex::new(PoolState {
                head: None,
                slabs: BTreeMap::new(),
                capacity: 0,
                in_use: 0,
            }),
        }
    }

    /// Size in bytes of each cell handed out by the pool.
    #[must_use]
    #[inline]
    pub fn cell_size(&self) -> usize {
        self.cell_size.get()
    }

    /// Number of cells added to the pool whenever it grows.
    #[must_use]
    #[inline]
    pub fn cells_per_slab(&self) -> usize {
        self.cells_per_slab.get()
    }

    /// Total number of cells in the pool, used or not. Never decreases.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Number of cells currently handed out to callers.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Takes a consistent snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();

        PoolStats {
            cell_size: self.cell_size.get(),
            cells_per_slab: self.cells_per_slab.get(),
            slab_count: state.slabs.len(),
            capacity: state.capacity,
            in_use: state.in_use,
        }
    }

    /// Hands out one cell of [`cell_size()`][Self::cell_size] bytes.
    ///
    /// The contents of the cell are unspecified. If the free list is empty, the pool first
    /// grows by one slab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`][crate::Error::OutOfMemory] if the pool needed to grow
    /// and the platform allocator could not provide a new slab. The pool is left unchanged.
    pub fn allocate(&self) -> Result<NonNull<u8>> {
        let mut state = self.state.lock();

        let (cell, grew) = match state.head {
            Some(cell) => (cell, false),
            None => (self.grow(&mut state)?, true),
        };

        // SAFETY: The cell was the head of the free list, so it holds a `FreeNode`.
        state.head = unsafe { FreeNode::next(cell) };

        state.in_use = state
            .in_use
            .checked_add(1)
            .expect("guarded by capacity which cannot exceed virtual memory");

        debug_assert!(state.in_use <= state.capacity);

        drop(state);

        // The thread-local events are gone during thread teardown, when observations are lost.
        if grew {
            _ = SLABS_ALLOCATED_BYTES.try_with(|e| e.observe(self.slab_size));
        } else {
            _ = CELLS_REUSED.try_with(Event::observe_once);
        }

        Ok(cell.cast())
    }

    /// Returns a cell to the pool. It becomes the next cell handed out by
    /// [`allocate()`][Self::allocate].
    ///
    /// # Safety
    ///
    /// The pointer must have been returned by [`allocate()`][Self::allocate] on this same pool
    /// and must not have been freed since. The caller must not access the cell afterwards.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the pointer is not the start of a cell of this pool.
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        let cell = ptr.cast::<FreeNode>();

        let mut state = self.state.lock();

        #[cfg(debug_assertions)]
        self.assert_owns_cell(&state, ptr);

        // SAFETY: The caller guarantees the cell came from this pool and is no longer used,
        // so it is ours to overwrite with the free list link.
        unsafe { FreeNode::link(cell, state.head) };

        state.head = Some(cell);

        state.in_use = state
            .in_use
            .checked_sub(1)
            .expect("freed more cells than were ever allocated from this pool");

        drop(state);

        // Memory held in thread-locals may be freed after the events are destroyed.
        _ = CELLS_FREED.try_with(Event::observe_once);
    }

    /// Adds one slab to the pool, threading all of its cells into a free list in address
    /// order. Returns the first cell, which the caller will make the new head.
    #[cold]
    fn grow(&self, state: &mut PoolState) -> Result<NonNull<FreeNode>> {
        debug_assert!(state.head.is_none(), "only grow when the free list is empty");

        let slab = aligned::allocate(self.slab_size, SLAB_ALIGNMENT)?;
        let cell_count = self.cells_per_slab.get();

        let mut next = None;

        // Link back to front so each cell can point at the one after it.
        for index in (0..cell_count).rev() {
            let cell = self.cell_ptr(&slab, index);

            // SAFETY: The cell lies within the fresh slab (index < cells_per_slab) and nobody
            // else knows about the slab yet.
            unsafe { FreeNode::link(cell, next) };

            next = Some(cell);
        }

        state.slabs.insert(slab.base().as_ptr().addr(), slab);

        state.capacity = state
            .capacity
            .checked_add(cell_count)
            .expect("capacity cannot exceed virtual memory");

        Ok(next.expect("guarded by cells_per_slab being non-zero"))
    }

    fn cell_ptr(&self, slab: &Region, index: usize) -> NonNull<FreeNode> {
        debug_assert!(index < self.cells_per_slab.get());

        // Cannot overflow because the slab size was validated at construction.
        let offset = index.wrapping_mul(self.cell_size.get());

        // SAFETY: Offset stays inside the slab, which is `cell_size * cells_per_slab` bytes.
        unsafe { slab.base().add(offset) }.cast()
    }

    #[cfg(debug_assertions)]
    fn assert_owns_cell(&self, state: &PoolState, ptr: NonNull<u8>) {
        // The only candidate is the slab with the highest base at or below the pointer.
        let offset = state
            .slabs
            .range(..=ptr.as_ptr().addr())
            .next_back()
            .and_then(|(_, slab)| slab.offset_of(ptr.as_ptr()))
            .unwrap_or_else(|| {
                panic!(
                    "freed pointer {ptr:?} does not belong to any slab of the pool with {} byte cells",
                    self.cell_size
                )
            });

        assert!(
            offset % self.cell_size.get() == 0,
            "freed pointer {ptr:?} is not at a cell boundary of the pool with {} byte cells",
            self.cell_size
        );
    }

    /// Walks the free list. Only for verifying invariants, this is linear in the list length.
    #[cfg(test)]
    pub(crate) fn free_list_len(&self) -> usize {
        let state = self.state.lock();

        let mut len: usize = 0;
        let mut current = state.head;

        while let Some(cell) = current {
            len = len.checked_add(1).expect("free list is bounded by capacity");

            // SAFETY: Every node on the free list holds a `FreeNode`.
            current = unsafe { FreeNode::next(cell) };
        }

        len
    }
}

impl Drop for FixedPool {
    fn drop(&mut self) {
        let state = self.state.get_mut();

        state.head = None;

        for slab in mem::take(&mut state.slabs).into_values() {
            // SAFETY: Every slab came from `aligned::allocate()` and is released only here.
            unsafe { aligned::free(slab) };
        }
    }
}
