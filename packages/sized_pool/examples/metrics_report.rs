//! Demonstrates the pool metrics reported into `nm`.

use nm::Report;
use sized_pool::SizeClassRegistry;

fn main() {
    let registry = SizeClassRegistry::new();

    let mut held = Vec::new();

    for round in 0..5 {
        for _ in 0..1000 {
            held.push(registry.allocate(48).unwrap());
        }

        for ptr in held.drain(..) {
            // SAFETY: Same size as allocation, not used afterwards.
            unsafe { registry.free(48, ptr) };
        }

        println!("round {round} done");
    }

    let report = Report::collect();
    println!("{report}");
}
