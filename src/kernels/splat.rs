//! Scatter-add of particle velocity into the field.
//!
//! Contributions are summed as fixed-point integers so the result does not
//! depend on which particle lands first. The fourth channel is a per-texel
//! particle count scaled by the splat weight on resolve.

use std::sync::atomic::{AtomicI64, Ordering};

use glam::{Vec3, Vec4};
use rayon::prelude::*;

use crate::atlas::AtlasLayout;

/// Fixed-point scale for the vector channels (must match the GPU shader).
pub const FIXED_POINT_SCALE: f32 = 1_000_000.0;

pub fn quantize(v: f32) -> i64 {
    (v * FIXED_POINT_SCALE).round() as i64
}

/// Per-texel `[vx, vy, vz, count]` integer accumulator.
#[derive(Debug)]
pub struct SplatAccumulator {
    cells: Vec<[AtomicI64; 4]>,
}

impl SplatAccumulator {
    pub fn new(texels: usize) -> Self {
        Self {
            cells: (0..texels).map(|_| Default::default()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn deposit(&self, texel: usize, velocity: Vec3) {
        let cell = &self.cells[texel];
        cell[0].fetch_add(quantize(velocity.x), Ordering::Relaxed);
        cell[1].fetch_add(quantize(velocity.y), Ordering::Relaxed);
        cell[2].fetch_add(quantize(velocity.z), Ordering::Relaxed);
        cell[3].fetch_add(1, Ordering::Relaxed);
    }

    /// Add the accumulated sums onto `field` and zero the accumulator.
    pub fn resolve_into(&mut self, field: &mut [Vec4], weight: f32) {
        field
            .par_iter_mut()
            .zip(self.cells.par_iter_mut())
            .for_each(|(texel, cell)| {
                let [x, y, z, n] = cell.each_mut().map(|a| std::mem::take(a.get_mut()));
                if x == 0 && y == 0 && z == 0 && n == 0 {
                    return;
                }
                let v = Vec3::new(x as f32, y as f32, z as f32) / FIXED_POINT_SCALE;
                *texel += v.extend(n as f32 * weight);
            });
    }
}

/// Accumulate `current - previous` of every particle into the texel holding
/// `fract(current)`.
pub fn splat(
    layout: &AtlasLayout,
    current: &[Vec4],
    previous: &[Vec4],
    accumulator: &mut SplatAccumulator,
    field: &mut [Vec4],
    weight: f32,
) {
    {
        let acc = &*accumulator;
        current
            .par_iter()
            .zip(previous.par_iter())
            .for_each(|(cur, prev)| {
                let pos = cur.truncate();
                let wrapped = pos - pos.floor();
                acc.deposit(layout.texel_of_position(wrapped), pos - prev.truncate());
            });
    }
    accumulator.resolve_into(field, weight);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    #[test]
    fn static_particles_only_mark_occupancy() {
        let layout = AtlasLayout::new(4).unwrap();
        let p = layout.cell_position(UVec3::new(2, 1, 3)).extend(1.0);
        let particles = vec![p; 5];
        let mut acc = SplatAccumulator::new(layout.texel_count());
        let mut field = vec![Vec4::ZERO; layout.texel_count()];
        splat(&layout, &particles, &particles, &mut acc, &mut field, 1.0);

        let hit = layout.texel_of_cell(UVec3::new(2, 1, 3));
        assert_eq!(field[hit], Vec4::new(0.0, 0.0, 0.0, 5.0));
        assert_eq!(field.iter().filter(|t| **t != Vec4::ZERO).count(), 1);
    }

    #[test]
    fn adds_onto_existing_field_and_clears_accumulator() {
        let layout = AtlasLayout::new(4).unwrap();
        let cur = vec![Vec4::new(0.5, 0.5, 0.5, 1.0)];
        let prev = vec![Vec4::new(0.49, 0.5, 0.51, 1.0)];
        let mut acc = SplatAccumulator::new(layout.texel_count());
        let mut field = vec![Vec4::splat(1.0); layout.texel_count()];
        splat(&layout, &cur, &prev, &mut acc, &mut field, 2.0);

        let hit = layout.texel_of_position(Vec3::splat(0.5));
        assert!((field[hit] - Vec4::new(1.01, 1.0, 0.99, 3.0)).abs().max_element() < 1e-5);

        acc.resolve_into(&mut field, 2.0);
        assert!((field[hit] - Vec4::new(1.01, 1.0, 0.99, 3.0)).abs().max_element() < 1e-5);
    }

    #[test]
    fn quantization_step_is_one_micro_unit() {
        assert_eq!(FIXED_POINT_SCALE, 1_000_000.0);
        assert_eq!(quantize(1e-6), 1);
        assert_eq!(quantize(-1e-6), -1);
        assert_eq!(quantize(4e-7), 0);
        assert_eq!(quantize(6e-7), 1);
        assert_eq!(quantize(1e-4), 100);
    }

    #[test]
    fn typical_velocity_survives_quantization() {
        let layout = AtlasLayout::new(4).unwrap();
        let cur = vec![Vec4::new(0.5, 0.5, 0.5, 1.0)];
        let prev = vec![Vec4::new(0.5 - 1.23e-4, 0.5, 0.5 + 4e-7, 1.0)];
        let mut acc = SplatAccumulator::new(layout.texel_count());
        let mut field = vec![Vec4::ZERO; layout.texel_count()];
        splat(&layout, &cur, &prev, &mut acc, &mut field, 1.0);

        let v = field[layout.texel_of_position(Vec3::splat(0.5))];
        assert!((v.x - 1.23e-4).abs() <= 0.5e-6 + 1e-7);
        // below half a step, the component is dropped
        assert_eq!(v.z, 0.0);
    }

    #[test]
    fn positions_outside_the_cube_wrap() {
        let layout = AtlasLayout::new(4).unwrap();
        let cur = vec![Vec4::new(1.5, 0.5, 0.5, 1.0)];
        let mut acc = SplatAccumulator::new(layout.texel_count());
        let mut field = vec![Vec4::ZERO; layout.texel_count()];
        splat(&layout, &cur, &cur, &mut acc, &mut field, 1.0);
        assert_eq!(field[layout.texel_of_position(Vec3::splat(0.5))].w, 1.0);
    }
}
