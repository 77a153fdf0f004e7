#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A size-classed caching allocator.
//!
//! Memory is handed out in cells of fixed sizes. Every request is rounded up to the next power
//! of two and served by the [`FixedPool`] of that size class. Freed cells are kept on the
//! pool's free list and handed out again before the pool asks the platform allocator for
//! more memory, which makes repeated allocation and deallocation of similar sizes cheap.
//!
//! The crate is built from four layers:
//!
//! * [`aligned`] obtains aligned blocks from the platform allocator, described by a
//!   [`Region`].
//! * [`FixedPool`] carves slabs into equal cells and keeps an intrusive free list through the
//!   unused ones.
//! * [`SizeClassRegistry`] owns one pool per [`SizeClass`] and maps byte sizes to pools. It
//!   keeps no per-allocation metadata, so memory must be freed with the size it was
//!   allocated with.
//! * [`RawBuffer`] is a growable array of [`PlainData`] that takes its storage from a
//!   registry.
//!
//! With the `cached_types` feature, types marked with [`pool_allocated!`] get a dedicated
//! pool of their own, used by [`PoolBox`].
//!
//! # Examples
//!
//! ## Allocating by size
//!
//! ```rust
//! use sized_pool::SizeClassRegistry;
//!
//! let registry = SizeClassRegistry::global();
//!
//! let ptr = registry.allocate(48).unwrap();
//!
//! // The memory is ours to use until it is freed.
//! // SAFETY: 48 bytes were allocated and nothing else refers to them.
//! unsafe { ptr.as_ptr().write_bytes(0xAB, 48) };
//!
//! // SAFETY: Freed with the same size it was allocated with, and not used afterwards.
//! unsafe { registry.free(48, ptr) };
//! ```
//!
//! ## Growable buffers
//!
//! ```rust
//! use sized_pool::{RawBuffer, SizeClassRegistry};
//!
//! let registry = SizeClassRegistry::new();
//!
//! let mut samples = RawBuffer::new_in(&registry);
//!
//! for sample in [3.5_f32, 1.25, 9.0] {
//!     samples.push(sample);
//! }
//!
//! assert_eq!(samples.len(), 3);
//! assert_eq!(samples.capacity(), 4);
//!
//! let copy = samples.clone();
//! assert_eq!(copy, samples);
//! ```
//!
//! # Metrics
//!
//! The pools report into [`nm`](https://docs.rs/nm) events named `sized_pool_*`: the bytes of
//! every new slab, every allocation served from a free list and every free. Collect them with
//! `nm::Report::collect()`.

pub mod aligned;
mod builder;
mod cached;
mod error;
mod metrics;
mod plain_data;
mod pool;
mod raw_buffer;
mod registry;
mod size_class;
mod spin_mutex;

pub use aligned::Region;
pub use builder::*;
pub use cached::*;
pub use error::Error;
pub(crate) use error::{Result, allocation_failed};
pub use plain_data::PlainData;
pub use pool::{FixedPool, MIN_CELL_SIZE, PoolStats, SLAB_ALIGNMENT};
pub use raw_buffer::RawBuffer;
pub use registry::{SizeClassRegistry, SizeClassRegistryBuilder};
pub use size_class::{SIZE_CLASS_COUNT, SizeClass, size_class_index};
