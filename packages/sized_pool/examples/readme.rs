//! Demonstrates allocating by size from the global registry and reusing freed memory.

use sized_pool::SizeClassRegistry;

fn main() {
    println!("=== Size-classed allocation ===");

    let registry = SizeClassRegistry::global();

    for size in [1, 24, 100, 4000] {
        let class = registry.size_class(size).unwrap();

        let ptr = registry.allocate(size).unwrap();

        // SAFETY: We own `size` bytes at `ptr`.
        unsafe { ptr.as_ptr().write_bytes(0, size) };

        // SAFETY: Same size as allocation, not used afterwards.
        unsafe { registry.free(size, ptr) };

        let again = registry.allocate(size).unwrap();
        assert_eq!(again, ptr);

        println!(
            "{size:>5} bytes -> class {:>2} ({} byte cells), freed cell reused at {ptr:?}",
            class.index(),
            class.cell_size()
        );

        // SAFETY: Same size as allocation, not used afterwards.
        unsafe { registry.free(size, again) };
    }

    println!("Example completed successfully!");
}
