//! Demonstrates per-type pools. Run with `--features cached_types` to route `PoolBox`
//! through the pools instead of the global allocator.

use sized_pool::{PoolAllocated, PoolBox, pool_allocated};

#[derive(Debug)]
struct Particle {
    position: [f32; 3],
    velocity: [f32; 3],
}

pool_allocated!(Particle);

fn main() {
    println!("pooled: {}", PoolBox::<Particle>::is_pooled());

    let mut particles: Vec<_> = (0_u8..100)
        .map(|i| {
            PoolBox::new(Particle {
                position: [f32::from(i), 0.0, 0.0],
                velocity: [0.0, 1.0, 0.0],
            })
        })
        .collect();

    for particle in &mut particles {
        let Particle { position, velocity } = &mut **particle;

        for (coordinate, speed) in position.iter_mut().zip(velocity.iter()) {
            *coordinate += speed;
        }
    }

    println!("first particle: {:?}", particles.first());
    println!(
        "pool cells in use: {} of {}",
        Particle::pool().in_use(),
        Particle::pool().capacity()
    );

    particles.clear();
    println!("after clear: {} in use", Particle::pool().in_use());
}
