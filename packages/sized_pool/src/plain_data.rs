/// Marker for `Copy` types whose values are nothing but initialized bytes.
///
/// [`RawBuffer`][crate::RawBuffer] moves its elements around with bitwise copies and compares
/// them byte by byte. Both are only meaningful for types without padding, without
/// uninitialized bytes and without anything that needs to run on drop.
///
/// # Safety
///
/// Implementors must guarantee that every byte of every value of the type is initialized,
/// i.e. the type has no padding bytes (including trailing padding), no unions with unused
/// bytes and no `MaybeUninit` fields. Two values must be interchangeable whenever their bytes
/// are equal.
///
/// # Examples
///
/// ```
/// use sized_pool::PlainData;
///
/// #[derive(Clone, Copy)]
/// #[repr(C)]
/// struct Rgba {
///     r: u8,
///     g: u8,
///     b: u8,
///     a: u8,
/// }
///
/// // SAFETY: Four `u8` fields in a `repr(C)` struct leave no room for padding.
/// unsafe impl PlainData for Rgba {}
/// ```
pub unsafe trait PlainData: Copy + 'static {}

macro_rules! impl_plain_data {
    ($($t:ty),* $(,)?) => {
        $(
            // SAFETY: Primitive without padding, all bytes always initialized.
            unsafe impl PlainData for $t {}
        )*
    };
}

impl_plain_data!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char,
);

// SAFETY: Arrays have no padding between elements, so an array of padding-free elements is
// itself padding-free.
unsafe impl<T: PlainData, const N: usize> PlainData for [T; N] {}
