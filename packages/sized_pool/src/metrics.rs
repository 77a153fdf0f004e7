//! Metrics for the pools in this crate.
//!
//! Events are reported into `nm`, so applications can inspect them via `nm::Report::collect()`.
//! The metrics use per-thread event instances to minimize contention.

use nm::{Event, Magnitude};

/// Histogram buckets for the size of newly allocated slabs in bytes.
///
/// Small size classes use large slabs of small cells and huge size classes use one cell per
/// slab, so the distribution spans everything from a few dozen bytes to many megabytes.
const SLAB_BYTES_BUCKETS: &[Magnitude] = &[
    64,
    256,
    1024,
    4096,
    16_384,
    65_536,
    262_144,
    1_048_576,
    16_777_216,
    268_435_456,
];

thread_local! {
    /// Event for observing a pool growing by one slab.
    ///
    /// The magnitude is the size of the slab in bytes.
    pub(crate) static SLABS_ALLOCATED_BYTES: Event = Event::builder()
        .name("sized_pool_slabs_allocated_bytes")
        .histogram(SLAB_BYTES_BUCKETS)
        .build();

    /// Event for observing an allocation served from a pool's free list without growing.
    pub(crate) static CELLS_REUSED: Event = Event::builder()
        .name("sized_pool_cells_reused")
        .build();

    /// Event for observing a cell being returned to a pool.
    pub(crate) static CELLS_FREED: Event = Event::builder()
        .name("sized_pool_cells_freed")
        .build();
}
