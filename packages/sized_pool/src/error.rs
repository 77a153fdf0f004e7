use std::alloc::{Layout, handle_alloc_error};

use thiserror::Error;

/// Errors that can occur when obtaining memory from the allocator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The platform allocator could not satisfy the request.
    #[error("out of memory: failed to allocate {size} bytes aligned to {alignment}")]
    OutOfMemory {
        /// The number of bytes requested from the platform allocator, after alignment padding.
        size: usize,

        /// The alignment requested from the platform allocator.
        alignment: usize,
    },

    /// The requested size is larger than the largest size class.
    #[error("no size class can serve an allocation of {size} bytes")]
    SizeTooLarge {
        /// The requested size in bytes.
        size: usize,
    },

    /// The requested alignment is not a power of two.
    #[error("alignment {alignment} is not a power of two")]
    InvalidAlignment {
        /// The alignment that was requested.
        alignment: usize,
    },

    /// Padding the requested size to the alignment boundary would overflow.
    #[error("{size} bytes cannot be padded to an alignment of {alignment} without overflow")]
    SizeOverflow {
        /// The requested size in bytes.
        size: usize,

        /// The alignment that was requested.
        alignment: usize,
    },
}

/// A specialized `Result` type for allocator operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Terminates the process or panics for an allocation that a container cannot recover from.
///
/// Out-of-memory goes through the standard allocation error handler, like for the standard
/// collections. Anything else means the requested capacity cannot be served at all.
#[cold]
pub(crate) fn allocation_failed(error: Error) -> ! {
    match error {
        Error::OutOfMemory { size, alignment } => match Layout::from_size_align(size, alignment) {
            Ok(layout) => handle_alloc_error(layout),
            Err(_) => panic!("{error}"),
        },
        _ => panic!("capacity overflow: {error}"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn out_of_memory_message_names_request() {
        let error = Error::OutOfMemory {
            size: 4096,
            alignment: 32,
        };

        let message = error.to_string();
        assert!(message.contains("4096"));
        assert!(message.contains("32"));
    }

    #[test]
    #[should_panic]
    fn size_too_large_is_fatal_for_containers() {
        allocation_failed(Error::SizeTooLarge { size: usize::MAX });
    }

    #[test]
    fn size_too_large_is_error() {
        let result: Result<()> = Err(Error::SizeTooLarge { size: usize::MAX });
        assert!(matches!(result, Err(Error::SizeTooLarge { size: usize::MAX })));
    }
}
