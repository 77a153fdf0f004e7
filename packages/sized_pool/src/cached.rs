//! Per-type pools for frequently allocated objects.
//!
//! A type opts in with [`pool_allocated!`][crate::pool_allocated], which gives it a dedicated
//! [`FixedPool`] sized exactly to the type. [`PoolBox`] then places values of the type into
//! that pool. With the `cached_types` feature disabled, `PoolBox` falls back to the global
//! allocator, so the same code can be built with and without the pools to compare them.

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::FixedPool;

/// A type with a dedicated, process-wide [`FixedPool`].
///
/// Implement it with [`pool_allocated!`][crate::pool_allocated] rather than by hand.
pub trait PoolAllocated: Sized + 'static {
    /// The pool that holds values of this type.
    ///
    /// Every cell of the pool must be large enough and sufficiently aligned for one `Self`.
    fn pool() -> &'static FixedPool;
}

/// Implements [`PoolAllocated`] for one or more types.
///
/// Each type gets its own lazily created pool with cells sized to the type and
/// [`DEFAULT_CELLS_PER_SLAB`][crate::DEFAULT_CELLS_PER_SLAB] cells per slab. The pool lives for
/// the rest of the process.
///
/// # Examples
///
/// ```
/// use sized_pool::{PoolAllocated, PoolBox, pool_allocated};
///
/// struct Order {
///     id: u64,
///     quantity: u32,
/// }
///
/// pool_allocated!(Order);
///
/// let order = PoolBox::new(Order { id: 7, quantity: 3 });
/// assert_eq!(order.quantity, 3);
///
/// assert_eq!(Order::pool().cell_size(), size_of::<Order>());
/// ```
#[macro_export]
macro_rules! pool_allocated {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::PoolAllocated for $t {
                fn pool() -> &'static $crate::FixedPool {
                    static POOL: ::std::sync::LazyLock<$crate::FixedPool> =
                        ::std::sync::LazyLock::new(|| {
                            $crate::FixedPool::builder()
                                .layout_of::<$t>()
                                .cells_per_slab($crate::DEFAULT_CELLS_PER_SLAB)
                                .build()
                        });

                    &POOL
                }
            }
        )+
    };
}

/// An owning pointer to a `T` that lives in the dedicated pool of `T`.
///
/// Behaves like a [`Box`]: it dereferences to the value, drops the value when dropped and
/// returns the memory to where it came from. With the `cached_types` feature enabled that is
/// [`T::pool()`][PoolAllocated::pool], otherwise the global allocator.
///
/// Running out of memory is fatal, like for `Box`.
pub struct PoolBox<T: PoolAllocated> {
    ptr: NonNull<T>,

    _owns: PhantomData<T>,
}

// SAFETY: The box exclusively owns its value, so sending it sends the value.
unsafe impl<T: PoolAllocated + Send> Send for PoolBox<T> {}
// SAFETY: Shared access only hands out shared references to the value.
unsafe impl<T: PoolAllocated + Sync> Sync for PoolBox<T> {}

impl<T: PoolAllocated> PoolBox<T> {
    /// Moves `value` into memory from the pool of `T`.
    #[must_use]
    pub fn new(value: T) -> Self {
        let ptr = Self::allocate();

        // SAFETY: Fresh memory, sized and aligned for a `T`.
        unsafe { ptr.write(value) };

        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    /// Moves the value out of the box and returns its memory.
    #[must_use]
    pub fn into_inner(boxed: Self) -> T {
        let boxed = ManuallyDrop::new(boxed);

        // SAFETY: The box holds an initialized value, which is moved out exactly once because
        // the box will not run its destructor.
        let value = unsafe { boxed.ptr.read() };

        // SAFETY: The memory came from `allocate()` and the value has been moved out.
        unsafe { Self::deallocate(boxed.ptr) };

        value
    }

    /// Whether this build places values into the per-type pools.
    #[must_use]
    #[inline]
    pub const fn is_pooled() -> bool {
        cfg!(feature = "cached_types")
    }

    #[cfg(feature = "cached_types")]
    fn allocate() -> NonNull<T> {
        T::pool()
            .allocate()
            .unwrap_or_else(|error| crate::allocation_failed(error))
            .cast()
    }

    #[cfg(not(feature = "cached_types"))]
    fn allocate() -> NonNull<T> {
        let boxed = Box::<T>::new_uninit();

        NonNull::from(Box::leak(boxed)).cast()
    }

    /// # Safety
    ///
    /// The memory must have come from `allocate()` and must no longer hold a live value.
    #[cfg(feature = "cached_types")]
    unsafe fn deallocate(ptr: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantee; `allocate()` took the cell from this pool.
        unsafe { T::pool().free(ptr.cast()) };
    }

    /// # Safety
    ///
    /// The memory must have come from `allocate()` and must no longer hold a live value.
    #[cfg(not(feature = "cached_types"))]
    unsafe fn deallocate(ptr: NonNull<T>) {
        // SAFETY: `allocate()` leaked a `Box<MaybeUninit<T>>`, which we take back without
        // dropping a value.
        drop(unsafe { Box::from_raw(ptr.cast::<std::mem::MaybeUninit<T>>().as_ptr()) });
    }
}

impl<T: PoolAllocated> Drop for PoolBox<T> {
    fn drop(&mut self) {
        // SAFETY: The box holds an initialized value that nobody else can reach.
        unsafe { self.ptr.drop_in_place() };

        // SAFETY: The memory came from `allocate()` and the value has been dropped.
        unsafe { Self::deallocate(self.ptr) };
    }
}

impl<T: PoolAllocated> Deref for PoolBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The box holds an initialized value for as long as it exists.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: PoolAllocated> DerefMut for PoolBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The box holds an initialized value and `&mut self` makes access exclusive.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: PoolAllocated + fmt::Debug> fmt::Debug for PoolBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
