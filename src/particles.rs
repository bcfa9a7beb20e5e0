//! Triple-buffered particle positions.
//!
//! Velocity is never stored: it is the difference between the two most
//! recent slots.

use glam::{Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::atlas::AtlasLayout;
use crate::config::{SimConfig, Seeding};
use crate::ring::RingBuffer;

/// Particle slots in the ring.
pub const PARTICLE_SLOTS: usize = 3;
/// Counter value the particle ring starts from.
pub const PARTICLE_INITIAL_INDEX: u64 = 3;

#[derive(Debug)]
pub struct ParticleStore {
    radius: u32,
    ring: RingBuffer<Vec<Vec4>>,
}

impl ParticleStore {
    /// Every slot starts with the same seeded positions, so the first
    /// velocity estimate is zero.
    pub fn seeded(config: &SimConfig, layout: &AtlasLayout) -> Self {
        let initial = seed_positions(config, layout);
        let slots = (0..PARTICLE_SLOTS).map(|_| initial.clone()).collect();
        Self {
            radius: config.particle_radius,
            ring: RingBuffer::new(slots, PARTICLE_INITIAL_INDEX),
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.ring.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.current().is_empty()
    }

    pub fn index(&self) -> u64 {
        self.ring.index()
    }

    pub fn current(&self) -> &[Vec4] {
        self.ring.current()
    }

    /// Slot written `back` rotations ago.
    pub fn previous(&self, back: usize) -> &[Vec4] {
        self.ring.previous(back)
    }

    pub fn ring(&self) -> &RingBuffer<Vec<Vec4>> {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut RingBuffer<Vec<Vec4>> {
        &mut self.ring
    }

    pub fn advance(&mut self) {
        self.ring.advance();
    }

    /// `current - previous` for particle `i`.
    pub fn velocity(&self, i: usize) -> Vec3 {
        (self.current()[i] - self.previous(1)[i]).truncate()
    }
}

/// Stable 2D id of particle `i`, as a texel-centred coordinate in the
/// `R × R` particle grid.
pub fn particle_uv(i: usize, radius: u32) -> Vec2 {
    let r = radius as usize;
    Vec2::new(
        (0.5 + (i % r) as f32) / radius as f32,
        (0.5 + (i / r) as f32) / radius as f32,
    )
}

fn seed_positions(config: &SimConfig, layout: &AtlasLayout) -> Vec<Vec4> {
    let count = config.particle_count();
    let (lo, hi) = layout.interior();
    let span = hi - lo;
    let mut rng = StdRng::seed_from_u64(config.seed);
    match &config.seeding {
        Seeding::Slab { z } => (0..count)
            .map(|_| {
                let x = rng.random::<f32>() * span + lo;
                let y = rng.random::<f32>() * span + lo;
                Vec4::new(x, y, *z, 1.0)
            })
            .collect(),
        Seeding::Volume => (0..count)
            .map(|_| {
                let p = Vec3::new(rng.random(), rng.random(), rng.random()) * span + Vec3::splat(lo);
                p.extend(1.0)
            })
            .collect(),
        Seeding::Point { position } => vec![Vec3::from_array(*position).extend(1.0); count],
    }
}
