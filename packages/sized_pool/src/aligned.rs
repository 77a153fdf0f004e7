//! Aligned allocation primitive.
//!
//! Every other component of this crate eventually obtains its backing memory through
//! [`allocate()`]. The returned [`Region`] describes the block (base address, padded size
//! and alignment) and must be handed back to [`free()`] to release it.

use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

use crate::{Error, Result};

/// Describes one contiguous block of memory obtained from [`allocate()`].
///
/// The base address is a multiple of [`alignment()`][Self::alignment] and the block is
/// [`size()`][Self::size] bytes long, where the size is the requested size rounded up to the
/// alignment boundary.
///
/// A region is a plain descriptor. Copying it does not copy or duplicate the memory, and
/// dropping it does not release the memory.
///
/// # Examples
///
/// ```
/// use sized_pool::aligned;
///
/// let region = aligned::allocate(100, 32).unwrap();
///
/// assert_eq!(region.size(), 128);
/// assert_eq!(region.base().as_ptr().addr() % 32, 0);
/// assert!(region.contains(region.base().as_ptr()));
///
/// // SAFETY: The region came from `aligned::allocate()` and is released exactly once.
/// unsafe { aligned::free(region) };
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Region {
    base: NonNull<u8>,
    size: usize,
    alignment: usize,
}

impl Region {
    /// The address of the first byte of the region.
    #[must_use]
    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// The number of usable bytes in the region.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The alignment guaranteed for the base address.
    #[must_use]
    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// The address one past the last byte of the region.
    #[must_use]
    #[inline]
    pub fn end(&self) -> *const u8 {
        // SAFETY: One-past-the-end of an allocation is a valid pointer to compute.
        unsafe { self.base.as_ptr().add(self.size) }
    }

    /// Returns the byte offset of `ptr` from the base of the region, or `None` if the
    /// pointer does not point into the region.
    #[must_use]
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let offset = ptr.addr().checked_sub(self.base.as_ptr().addr())?;

        (offset < self.size).then_some(offset)
    }

    /// Whether `ptr` points at one of the bytes of the region.
    #[must_use]
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.offset_of(ptr).is_some()
    }

    fn layout(&self) -> Layout {
        Layout::from_size_align(self.size, self.alignment)
            .expect("region layout was validated when the region was allocated")
    }
}

// SAFETY: A region is only a description of a memory block; it grants no access by itself.
// All access to the described memory goes through unsafe code that upholds its own contract.
unsafe impl Send for Region {}
// SAFETY: See above, there is nothing to synchronize in the descriptor itself.
unsafe impl Sync for Region {}

/// Allocates a block of at least `size` bytes whose address is a multiple of `alignment`.
///
/// The size is rounded up to the next multiple of `alignment`. A zero `size` is treated as
/// one alignment unit so that a distinct block is still returned.
///
/// # Errors
///
/// * [`Error::InvalidAlignment`] if `alignment` is not a power of two.
/// * [`Error::SizeOverflow`] if the padded size cannot be represented.
/// * [`Error::OutOfMemory`] if the platform allocator cannot satisfy the request.
///
/// # Examples
///
/// ```
/// use sized_pool::aligned;
///
/// let region = aligned::allocate(0, 16).unwrap();
/// assert_eq!(region.size(), 16);
///
/// // SAFETY: The region came from `aligned::allocate()` and is released exactly once.
/// unsafe { aligned::free(region) };
/// ```
pub fn allocate(size: usize, alignment: usize) -> Result<Region> {
    if !alignment.is_power_of_two() {
        return Err(Error::InvalidAlignment { alignment });
    }

    let padded_size = size
        .max(1)
        .checked_next_multiple_of(alignment)
        .ok_or(Error::SizeOverflow { size, alignment })?;

    let layout = Layout::from_size_align(padded_size, alignment)
        .map_err(|_| Error::SizeOverflow { size, alignment })?;

    // SAFETY: The layout has a non-zero size (guarded by `max(1)` above).
    let base = NonNull::new(unsafe { alloc(layout) }).ok_or(Error::OutOfMemory {
        size: padded_size,
        alignment,
    })?;

    Ok(Region {
        base,
        size: padded_size,
        alignment,
    })
}

/// Releases a block previously obtained from [`allocate()`].
///
/// # Safety
///
/// The region must have been returned by [`allocate()`] and must not have been freed yet.
/// No pointers into the region may be used after this call.
pub unsafe fn free(region: Region) {
    // SAFETY: Forwarding the caller's guarantee; the layout is the one used to allocate.
    unsafe {
        dealloc(region.base.as_ptr(), region.layout());
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Region: Send, Sync, Copy);

    #[test]
    fn base_respects_alignment() {
        for alignment in [1, 2, 8, 16, 32, 64, 4096] {
            let region = allocate(3, alignment).unwrap();

            assert_eq!(region.base().as_ptr().addr() % alignment, 0);
            assert_eq!(region.alignment(), alignment);

            // SAFETY: Allocated above, freed once.
            unsafe { free(region) };
        }
    }

    #[test]
    fn size_is_padded_to_alignment() {
        let region = allocate(33, 32).unwrap();
        assert_eq!(region.size(), 64);

        // SAFETY: Allocated above, freed once.
        unsafe { free(region) };

        let region = allocate(64, 32).unwrap();
        assert_eq!(region.size(), 64);

        // SAFETY: Allocated above, freed once.
        unsafe { free(region) };
    }

    #[test]
    fn zero_size_gets_one_alignment_unit() {
        let region = allocate(0, 8).unwrap();
        assert_eq!(region.size(), 8);

        // SAFETY: Allocated above, freed once.
        unsafe { free(region) };
    }

    #[test]
    fn non_power_of_two_alignment_is_error() {
        assert!(matches!(
            allocate(16, 24),
            Err(Error::InvalidAlignment { alignment: 24 })
        ));
        assert!(matches!(
            allocate(16, 0),
            Err(Error::InvalidAlignment { alignment: 0 })
        ));
    }

    #[test]
    fn padding_overflow_is_error() {
        assert!(matches!(
            allocate(usize::MAX - 3, 8),
            Err(Error::SizeOverflow { .. })
        ));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri reports the oversized allocation instead of failing it")]
    fn platform_failure_is_out_of_memory() {
        let size = usize::MAX / 4;

        assert!(matches!(
            allocate(size, 8),
            Err(Error::OutOfMemory { alignment: 8, .. })
        ));
    }

    #[test]
    fn bounds_queries() {
        let region = allocate(64, 16).unwrap();
        let base = region.base().as_ptr();

        assert_eq!(region.offset_of(base), Some(0));
        // SAFETY: Stays within the 64-byte region.
        assert_eq!(region.offset_of(unsafe { base.add(63) }), Some(63));
        assert_eq!(region.offset_of(region.end()), None);
        assert!(!region.contains(region.end()));
        assert!(!region.contains(base.wrapping_sub(1)));

        // SAFETY: Allocated above, freed once.
        unsafe { free(region) };
    }

    #[test]
    fn memory_is_writable_across_whole_region() {
        let region = allocate(100, 32).unwrap();

        // SAFETY: The region is valid for writes of `size()` bytes.
        unsafe {
            region.base().as_ptr().write_bytes(0xAB, region.size());
        }

        // SAFETY: Just initialized above.
        let last = unsafe { region.base().as_ptr().add(region.size() - 1).read() };
        assert_eq!(last, 0xAB);

        // SAFETY: Allocated above, freed once.
        unsafe { free(region) };
    }
}
