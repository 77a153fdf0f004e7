//! Demonstrates how a `RawBuffer` grows and hands its old regions back to the registry.

use sized_pool::{RawBuffer, SizeClassRegistry};

fn main() {
    println!("=== RawBuffer growth ===");

    let registry = SizeClassRegistry::new();
    let mut readings = RawBuffer::new_in(&registry);

    let mut last_capacity = readings.capacity();

    for reading in 0..100_u32 {
        readings.push(reading * 3);

        if readings.capacity() != last_capacity {
            last_capacity = readings.capacity();
            println!(
                "len {:>3}: grew to capacity {last_capacity} at {:?}",
                readings.len(),
                readings.as_ptr()
            );
        }
    }

    readings.erase(10..90);
    readings.insert_slice(5, &[1000, 1001]);
    println!("after editing: {readings:?}");

    let copy = readings.clone();
    assert_eq!(copy, readings);
    assert!(!copy.is_identical(&readings));

    for (class, stats) in registry.stats().filter(|(_, stats)| stats.capacity() > 0) {
        println!(
            "class {:>2}: {} of {} cells in use",
            class.index(),
            stats.in_use(),
            stats.capacity()
        );
    }

    readings.clear();
    assert!(readings.as_ptr().is_null());

    println!("Example completed successfully!");
}
