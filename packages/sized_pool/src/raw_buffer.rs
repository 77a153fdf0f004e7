use std::fmt;
use std::mem;
use std::ops::{Bound, Deref, DerefMut, RangeBounds};
use std::ptr::{self, NonNull};
use std::slice;

use crate::{PlainData, SLAB_ALIGNMENT, SizeClassRegistry, allocation_failed};

/// A growable array of plain data whose storage comes from a [`SizeClassRegistry`].
///
/// The buffer owns at most one region of the registry. It grows geometrically: when it needs
/// room for more elements than it has capacity for, it moves to a region of at least twice its
/// current length. The old region goes back to the registry, keyed by its own allocation size,
/// where it is immediately available to the next buffer of the same size class.
///
/// Elements are moved with bitwise copies and compared byte by byte, which is why the element
/// type must be [`PlainData`].
///
/// Running out of memory is fatal, like for the standard collections.
///
/// # Examples
///
/// ```
/// use sized_pool::{RawBuffer, SizeClassRegistry};
///
/// let registry = SizeClassRegistry::new();
/// let mut buffer = RawBuffer::new_in(&registry);
///
/// buffer.push(1_u32);
/// buffer.push(2);
/// buffer.extend_from_slice(&[3, 4, 5]);
///
/// assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 5]);
/// assert_eq!(buffer.pop(), Some(5));
/// assert_eq!(buffer.len(), 4);
/// ```
pub struct RawBuffer<'r, T: PlainData> {
    /// `None` if and only if `capacity` is zero.
    ptr: Option<NonNull<T>>,
    len: usize,
    capacity: usize,

    registry: &'r SizeClassRegistry,
}

// SAFETY: The buffer exclusively owns its region, so sending it sends the elements.
unsafe impl<T: PlainData + Send> Send for RawBuffer<'_, T> {}
// SAFETY: Shared access only hands out shared references to the elements.
unsafe impl<T: PlainData + Sync> Sync for RawBuffer<'_, T> {}

impl<T: PlainData> RawBuffer<'static, T> {
    /// Creates an empty buffer that allocates from [`SizeClassRegistry::global()`].
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or aligned beyond [`SLAB_ALIGNMENT`].
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(SizeClassRegistry::global())
    }

    /// Creates a buffer with room for `capacity` elements that allocates from
    /// [`SizeClassRegistry::global()`].
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or aligned beyond [`SLAB_ALIGNMENT`], or if the capacity
    /// exceeds the largest size class.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, SizeClassRegistry::global())
    }
}

impl<'r, T: PlainData> RawBuffer<'r, T> {
    /// Creates an empty buffer that allocates from `registry`. Does not allocate.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or aligned beyond [`SLAB_ALIGNMENT`].
    #[must_use]
    pub fn new_in(registry: &'r SizeClassRegistry) -> Self {
        assert!(
            size_of::<T>() != 0,
            "RawBuffer cannot store zero-sized elements"
        );
        assert!(
            align_of::<T>() <= SLAB_ALIGNMENT,
            "RawBuffer element alignment {} exceeds the slab alignment of {SLAB_ALIGNMENT}",
            align_of::<T>()
        );

        Self {
            ptr: None,
            len: 0,
            capacity: 0,
            registry,
        }
    }

    /// Creates a buffer with room for `capacity` elements that allocates from `registry`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or aligned beyond [`SLAB_ALIGNMENT`], or if the capacity
    /// exceeds the largest size class.
    #[must_use]
    pub fn with_capacity_in(capacity: usize, registry: &'r SizeClassRegistry) -> Self {
        let mut buffer = Self::new_in(registry);
        buffer.reserve(capacity);
        buffer
    }

    /// The registry the buffer allocates from.
    #[must_use]
    #[inline]
    pub fn registry(&self) -> &'r SizeClassRegistry {
        self.registry
    }

    /// Number of elements in the buffer.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the buffer can hold without moving to a new region.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pointer to the first element, or null if the buffer has no region.
    #[must_use]
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.map_or(ptr::null(), |ptr| ptr.as_ptr().cast_const())
    }

    /// Mutable pointer to the first element, or null if the buffer has no region.
    #[must_use]
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// The elements of the buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self.ptr {
            // SAFETY: The region holds `capacity >= len` elements and the first `len` are
            // initialized (or the caller of `resize_uninit` promised to initialize them).
            Some(ptr) => unsafe { slice::from_raw_parts(ptr.as_ptr(), self.len) },
            None => &[],
        }
    }

    /// The elements of the buffer, mutably.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.ptr {
            // SAFETY: As in `as_slice()`, and `&mut self` makes the access exclusive.
            Some(ptr) => unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// Whether both buffers are backed by the same region. Two buffers without a region are
    /// identical.
    #[must_use]
    #[inline]
    pub fn is_identical(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }

    /// Ensures room for at least `capacity` elements.
    ///
    /// Does nothing if the buffer is already large enough. Otherwise the buffer moves to a new
    /// region of `max(capacity, 2 * len)` elements and returns its old region to the
    /// registry.
    ///
    /// # Panics
    ///
    /// Panics if the new region would exceed the largest size class. Aborts if the registry
    /// is out of memory.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }

        let new_capacity = capacity.max(self.len.saturating_mul(2));
        let new_byte_size = Self::byte_size(new_capacity);

        let new_ptr = self
            .registry
            .allocate(new_byte_size)
            .unwrap_or_else(|error| allocation_failed(error))
            .cast::<T>();

        if let Some(old_ptr) = self.ptr {
            // SAFETY: Both regions hold at least `len` elements and are distinct, as the old
            // one is still allocated.
            unsafe { ptr::copy_nonoverlapping(old_ptr.as_ptr(), new_ptr.as_ptr(), self.len) };

            // SAFETY: The old region was allocated with exactly this byte size and nobody
            // refers to it anymore.
            unsafe { self.registry.free(self.allocated_bytes(), old_ptr.cast()) };
        }

        self.ptr = Some(new_ptr);
        self.capacity = new_capacity;
    }

    /// Sets the length to `len`, growing the region if needed.
    ///
    /// # Safety
    ///
    /// When growing, the elements from the old length up to `len` are uninitialized. The
    /// caller must write every one of them before reading it or reading the buffer as a
    /// slice.
    pub unsafe fn resize_uninit(&mut self, len: usize) {
        self.reserve(len);
        self.len = len;
    }

    /// Sets the length to `len`, filling any new elements with `value`.
    pub fn resize(&mut self, len: usize, value: T) {
        let old_len = self.len;
        self.reserve(len);

        if len > old_len {
            let base = self.base();

            for index in old_len..len {
                // SAFETY: `index < len <= capacity`, inside the region.
                unsafe { base.add(index).write(value) };
            }
        }

        self.len = len;
    }

    /// Returns the region to the registry. The buffer is left empty and without capacity.
    pub fn clear(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: The region was allocated with exactly this byte size and the buffer
            // has just forgotten about it.
            unsafe { self.registry.free(self.allocated_bytes(), ptr.cast()) };
        }

        self.len = 0;
        self.capacity = 0;
    }

    /// Shortens the buffer to `len` elements. Does nothing if it is not longer than that.
    /// The capacity is unchanged.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Appends one element, growing the region if needed.
    pub fn push(&mut self, value: T) {
        let new_len = self.len.checked_add(1).expect("capacity overflow");
        self.reserve(new_len);

        // SAFETY: `len < new_len <= capacity`, inside the region.
        unsafe { self.base().add(self.len).write(value) };

        self.len = new_len;
    }

    /// Removes the last element and returns it, or `None` if the buffer is empty. The memory
    /// of the element is left as is.
    pub fn pop(&mut self) -> Option<T> {
        self.len = self.len.checked_sub(1)?;

        // SAFETY: The former last element is inside the region and initialized.
        Some(unsafe { self.base().add(self.len).read() })
    }

    /// Replaces the contents of the buffer with a copy of `values`.
    pub fn assign(&mut self, values: &[T]) {
        // SAFETY: Every new element is overwritten right below.
        unsafe { self.resize_uninit(values.len()) };

        if let Some(ptr) = self.ptr {
            // SAFETY: The region holds at least `values.len()` elements. `values` cannot
            // alias the buffer, which we borrow exclusively.
            unsafe { ptr::copy_nonoverlapping(values.as_ptr(), ptr.as_ptr(), values.len()) };
        }
    }

    /// Appends a copy of `values`.
    pub fn extend_from_slice(&mut self, values: &[T]) {
        self.insert_slice(self.len, values);
    }

    /// Inserts one element at `index`, shifting everything after it up by one.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        self.insert_slice(index, slice::from_ref(&value));
    }

    /// Inserts a copy of `values` at `index`, shifting everything after it up.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert_slice(&mut self, index: usize, values: &[T]) {
        assert!(
            index <= self.len,
            "insertion index (is {index}) should be <= len (is {})",
            self.len
        );

        if values.is_empty() {
            return;
        }

        let count = values.len();
        let new_len = self.len.checked_add(count).expect("capacity overflow");
        self.reserve(new_len);

        let base = self.base();

        // SAFETY: `index <= len < new_len <= capacity`, all inside the region.
        let gap = unsafe { base.add(index) };
        // SAFETY: `index + count == new_len - (len - index) <= capacity`.
        let tail = unsafe { base.add(index.wrapping_add(count)) };

        // SAFETY: Source `[index, len)` and destination `[index + count, new_len)` are both
        // inside the region; `ptr::copy` handles the overlap.
        unsafe { ptr::copy(gap, tail, self.len.wrapping_sub(index)) };

        // SAFETY: `[index, index + count)` is inside the region and `values` cannot alias
        // the buffer, which we borrow exclusively.
        unsafe { ptr::copy_nonoverlapping(values.as_ptr(), gap, count) };

        self.len = new_len;
    }

    /// Removes the element at `index` and returns it, shifting everything after it down.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) -> T {
        let value = *self.as_slice().get(index).unwrap_or_else(|| {
            panic!(
                "removal index (is {index}) should be < len (is {})",
                self.len
            )
        });

        self.erase(index..=index);
        value
    }

    /// Removes the elements in `range`, shifting everything after it down.
    ///
    /// # Panics
    ///
    /// Panics if the range starts after it ends or ends after the last element.
    pub fn erase<R: RangeBounds<usize>>(&mut self, range: R) {
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.checked_add(1).expect("range start overflow"),
            Bound::Unbounded => 0,
        };

        let end = match range.end_bound() {
            Bound::Included(&end) => end.checked_add(1).expect("range end overflow"),
            Bound::Excluded(&end) => end,
            Bound::Unbounded => self.len,
        };

        assert!(start <= end, "erase range starts at {start} but ends at {end}");
        assert!(
            end <= self.len,
            "erase range end (is {end}) should be <= len (is {})",
            self.len
        );

        if start == end {
            return;
        }

        let base = self.base();

        // SAFETY: `start < end <= len <= capacity`, inside the region.
        let hole = unsafe { base.add(start) };
        // SAFETY: `end <= len <= capacity`, inside the region or one past its last element.
        let tail = unsafe { base.add(end) };

        // SAFETY: Source `[end, len)` and destination `[start, start + len - end)` are both
        // inside the initialized part of the region; `ptr::copy` handles the overlap.
        unsafe { ptr::copy(tail, hole, self.len.wrapping_sub(end)) };

        // Cannot underflow, `start <= end <= len`.
        self.len = self.len.wrapping_sub(end.wrapping_sub(start));
    }

    /// Exchanges the contents of two buffers without copying any elements.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// # Panics
    ///
    /// Panics if the buffer has no region.
    fn base(&self) -> *mut T {
        self.ptr
            .expect("guarded by a preceding reserve() of a non-zero capacity")
            .as_ptr()
    }

    /// The byte size the current region was allocated with. The registry requires it back
    /// when the region is freed.
    fn allocated_bytes(&self) -> usize {
        // Cannot overflow, the same product was checked when the region was allocated.
        self.capacity.wrapping_mul(size_of::<T>())
    }

    fn byte_size(capacity: usize) -> usize {
        capacity
            .checked_mul(size_of::<T>())
            .expect("capacity overflow")
    }

    fn as_bytes(&self) -> &[u8] {
        let slice = self.as_slice();

        // SAFETY: `PlainData` guarantees every byte of every element is initialized.
        unsafe { slice::from_raw_parts(slice.as_ptr().cast::<u8>(), mem::size_of_val(slice)) }
    }
}

impl<T: PlainData> Default for RawBuffer<'static, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PlainData> Drop for RawBuffer<'_, T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: PlainData> Clone for RawBuffer<'_, T> {
    fn clone(&self) -> Self {
        let mut clone = Self::new_in(self.registry);
        clone.assign(self.as_slice());
        clone
    }
}

impl<T: PlainData> Deref for RawBuffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: PlainData> DerefMut for RawBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: PlainData> PartialEq for RawBuffer<'_, T> {
    /// Buffers are equal if they share a region or hold the same bytes.
    fn eq(&self, other: &Self) -> bool {
        self.is_identical(other) || (self.len == other.len && self.as_bytes() == other.as_bytes())
    }
}

impl<T: PlainData> Eq for RawBuffer<'_, T> {}

impl<T: PlainData + fmt::Debug> fmt::Debug for RawBuffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::SizeClass;

    assert_impl_all!(RawBuffer<'static, u64>: Send, Sync, Clone, std::fmt::Debug);

    #[test]
    fn new_is_empty_and_unallocated() {
        let registry = SizeClassRegistry::new();
        let buffer = RawBuffer::<u32>::new_in(&registry);

        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.is_empty());
        assert!(buffer.as_ptr().is_null());
        assert!(buffer.as_slice().is_empty());
        assert!(registry.stats().all(|(_, stats)| stats.capacity() == 0));
    }

    #[test]
    fn push_then_read_in_order() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        for value in 0..100_u32 {
            buffer.push(value);
        }

        assert_eq!(buffer.len(), 100);
        assert!(buffer.iter().copied().eq(0..100));
    }

    #[test]
    fn growth_doubles_length() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        let mut capacities = Vec::new();

        for value in 0..9_u64 {
            buffer.push(value);
            capacities.push(buffer.capacity());
        }

        assert_eq!(capacities, [1, 2, 4, 4, 8, 8, 8, 8, 16]);
    }

    #[test]
    fn reserve_beyond_double_uses_request() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.extend_from_slice(&[1_u16, 2]);
        assert_eq!(buffer.capacity(), 2);

        buffer.reserve(3);
        assert_eq!(buffer.capacity(), 4);

        buffer.reserve(10);
        assert_eq!(buffer.capacity(), 10);
        assert_eq!(buffer.as_slice(), &[1, 2]);
    }

    #[test]
    fn reserve_within_capacity_keeps_region() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::<u8>::with_capacity_in(32, &registry);

        let ptr = buffer.as_ptr();

        for n in [0, 1, 16, 32] {
            buffer.reserve(n);
            assert_eq!(buffer.as_ptr(), ptr);
            assert_eq!(buffer.capacity(), 32);
        }
    }

    #[test]
    fn old_region_is_freed_by_its_own_size() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        let class_8 = SizeClass::for_size(8).unwrap();
        let class_16 = SizeClass::for_size(16).unwrap();

        buffer.push(1_u64);
        assert_eq!(registry.pool(class_8).in_use(), 1);

        buffer.push(2);
        assert_eq!(registry.pool(class_8).in_use(), 0);
        assert_eq!(registry.pool(class_16).in_use(), 1);

        drop(buffer);
        assert_eq!(registry.pool(class_16).in_use(), 0);
    }

    #[test]
    fn clear_releases_region() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.extend_from_slice(&[1_i32, 2, 3]);
        buffer.clear();

        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.as_ptr().is_null());
        assert!(registry.stats().all(|(_, stats)| stats.in_use() == 0));

        // Usable again afterwards.
        buffer.push(4);
        assert_eq!(buffer.as_slice(), &[4]);
    }

    #[test]
    fn resize_shrink_and_grow_preserves_prefix() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.resize(5, 7_u8);
        assert_eq!(buffer.as_slice(), &[7; 5]);

        buffer.resize(2, 0);
        assert_eq!(buffer.as_slice(), &[7, 7]);
        assert_eq!(buffer.capacity(), 5);

        buffer.resize(5, 1);
        assert!(buffer.capacity() >= 5);
        assert_eq!(buffer.as_slice(), &[7, 7, 1, 1, 1]);
    }

    #[test]
    fn resize_uninit_then_write() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::<u32>::new_in(&registry);

        // SAFETY: Every element is written below before anything reads it.
        unsafe { buffer.resize_uninit(4) };

        for (index, value) in buffer.as_mut_slice().iter_mut().enumerate() {
            *value = u32::try_from(index).unwrap() * 10;
        }

        assert_eq!(buffer.as_slice(), &[0, 10, 20, 30]);
    }

    #[test]
    fn pop_returns_last() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        assert_eq!(buffer.pop(), None);

        buffer.extend_from_slice(&['a', 'b']);

        assert_eq!(buffer.pop(), Some('b'));
        assert_eq!(buffer.pop(), Some('a'));
        assert_eq!(buffer.pop(), None);
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn assign_replaces_contents() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.extend_from_slice(&[9_u32; 10]);
        buffer.assign(&[1, 2, 3]);
        assert_eq!(buffer.as_slice(), &[1, 2, 3]);

        buffer.assign(&[]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn insert_shifts_tail() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.extend_from_slice(&[1_u8, 2, 5]);
        buffer.insert_slice(2, &[3, 4]);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 5]);

        buffer.insert(0, 0);
        buffer.insert(6, 6);
        assert_eq!(buffer.as_slice(), &[0, 1, 2, 3, 4, 5, 6]);

        buffer.insert_slice(3, &[]);
        assert_eq!(buffer.len(), 7);
    }

    #[test]
    #[should_panic]
    fn insert_out_of_bounds_panics() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.push(1_u8);
        buffer.insert(2, 2);
    }

    #[test]
    fn erase_shifts_tail() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.extend_from_slice(&[0_i64, 1, 2, 3, 4, 5, 6]);

        buffer.erase(1..3);
        assert_eq!(buffer.as_slice(), &[0, 3, 4, 5, 6]);

        buffer.erase(3..);
        assert_eq!(buffer.as_slice(), &[0, 3, 4]);

        buffer.erase(1..1);
        assert_eq!(buffer.as_slice(), &[0, 3, 4]);

        assert_eq!(buffer.remove(1), 3);
        assert_eq!(buffer.as_slice(), &[0, 4]);

        buffer.erase(..);
        assert!(buffer.is_empty());
    }

    #[test]
    #[should_panic]
    fn erase_out_of_bounds_panics() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.extend_from_slice(&[1_u8, 2]);
        buffer.erase(1..3);
    }

    #[test]
    #[should_panic]
    fn remove_out_of_bounds_panics() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::<u8>::new_in(&registry);

        buffer.remove(0);
    }

    #[test]
    fn truncate_keeps_capacity() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.extend_from_slice(&[1_u32, 2, 3, 4]);
        buffer.truncate(10);
        assert_eq!(buffer.len(), 4);

        buffer.truncate(1);
        assert_eq!(buffer.as_slice(), &[1]);
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn equality_compares_bytes() {
        let registry = SizeClassRegistry::new();

        let mut a = RawBuffer::new_in(&registry);
        let mut b = RawBuffer::new_in(&registry);
        assert_eq!(a, b);

        a.extend_from_slice(&[1_u32, 2, 3]);
        b.extend_from_slice(&[1_u32, 2, 3]);
        assert_eq!(a, b);
        assert!(!a.is_identical(&b));

        b.push(4);
        assert_ne!(a, b);

        b.pop();
        b[2] = 30;
        assert_ne!(a, b);
        assert!(a != b);
    }

    #[test]
    fn equality_ignores_spare_capacity() {
        let registry = SizeClassRegistry::new();

        let mut a = RawBuffer::with_capacity_in(16, &registry);
        let mut b = RawBuffer::new_in(&registry);

        a.extend_from_slice(&[5_u8, 6]);
        b.extend_from_slice(&[5_u8, 6, 7]);
        b.truncate(2);

        assert_eq!(a, b);
    }

    #[test]
    fn swap_exchanges_regions() {
        let registry = SizeClassRegistry::new();

        let mut a = RawBuffer::new_in(&registry);
        let mut b = RawBuffer::new_in(&registry);

        a.extend_from_slice(&[1_u16, 2, 3]);
        b.push(9);

        let a_ptr = a.as_ptr();
        let b_ptr = b.as_ptr();

        a.swap(&mut b);

        assert_eq!(a.as_ptr(), b_ptr);
        assert_eq!(b.as_ptr(), a_ptr);
        assert_eq!(a.as_slice(), &[9]);
        assert_eq!(b.as_slice(), &[1, 2, 3]);
        assert_eq!(a.capacity(), 1);
        assert_eq!(b.capacity(), 3);
    }

    #[test]
    fn clone_is_equal_but_not_identical() {
        let registry = SizeClassRegistry::new();
        let mut original = RawBuffer::new_in(&registry);

        original.extend_from_slice(&[1.5_f64, 2.5]);

        let clone = original.clone();

        assert_eq!(clone, original);
        assert!(!clone.is_identical(&original));
        assert!(std::ptr::eq(clone.registry(), &registry));

        original.push(3.5);
        assert_ne!(clone, original);
    }

    #[test]
    fn arrays_as_elements() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.push([1_u8, 2, 3]);
        buffer.push([4, 5, 6]);

        assert_eq!(buffer[1], [4, 5, 6]);
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn debug_lists_elements() {
        let registry = SizeClassRegistry::new();
        let mut buffer = RawBuffer::new_in(&registry);

        buffer.extend_from_slice(&[1_u8, 2]);

        assert_eq!(format!("{buffer:?}"), "[1, 2]");
    }

    #[test]
    #[should_panic]
    fn zero_sized_elements_panic() {
        let registry = SizeClassRegistry::new();
        let _buffer = RawBuffer::<[u8; 0]>::new_in(&registry);
    }

    #[test]
    #[should_panic]
    fn over_aligned_elements_panic() {
        #[derive(Clone, Copy)]
        #[repr(C, align(64))]
        struct Aligned64 {
            _value: [u8; 64],
        }

        // SAFETY: 64 bytes of data in a 64-byte aligned struct, no padding.
        unsafe impl PlainData for Aligned64 {}

        let registry = SizeClassRegistry::new();
        let _buffer = RawBuffer::<Aligned64>::new_in(&registry);
    }

    #[test]
    #[should_panic]
    fn capacity_beyond_largest_class_panics() {
        let registry = SizeClassRegistry::new();
        let _buffer = RawBuffer::<u64>::with_capacity_in(usize::MAX / 8, &registry);
    }
}
