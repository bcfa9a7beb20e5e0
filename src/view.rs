//! Read-only frame hand-off for renderers, plus summary statistics.

use glam::{UVec3, Vec2, Vec3, Vec4};
use serde::Serialize;

use crate::atlas::AtlasLayout;
use crate::field::{field_energy, occupied_cells};
use crate::particles::particle_uv;

/// Borrowed buffers of one completed frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub layout: AtlasLayout,
    pub particle_radius: u32,
    /// Post-advection positions.
    pub current: &'a [Vec4],
    /// Positions one frame earlier.
    pub previous: &'a [Vec4],
    /// Post-diffusion field texels.
    pub field: &'a [Vec4],
    pub particle_index: u64,
    pub field_index: u64,
}

impl FrameView<'_> {
    /// `current - previous` per particle.
    pub fn velocities(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.current
            .iter()
            .zip(self.previous)
            .map(|(c, p)| (*c - *p).truncate())
    }

    /// Direction-of-motion colour in `[0,1]³`; a resting particle is grey.
    pub fn particle_colors(&self) -> Vec<Vec3> {
        self.velocities()
            .map(|v| 0.5 * (Vec3::ONE + v.normalize_or_zero()))
            .collect()
    }

    /// Stable per-particle ids as particle-grid coordinates.
    pub fn particle_ids(&self) -> Vec<Vec2> {
        (0..self.current.len())
            .map(|i| particle_uv(i, self.particle_radius))
            .collect()
    }

    /// Colour of the field's vector channel for every cell, in
    /// [`field_lattice`] order.
    pub fn field_colors(&self) -> Vec<Vec3> {
        lattice_cells(&self.layout)
            .map(|cell| {
                let texel = self.field[self.layout.texel_of_cell(cell)];
                0.5 * (Vec3::ONE + texel.truncate().normalize_or_zero())
            })
            .collect()
    }

    pub fn stats(&self, frame: u64) -> FrameStats {
        let mut sum_speed = 0.0f64;
        let mut max_speed = 0.0f32;
        for v in self.velocities() {
            let s = v.length();
            sum_speed += f64::from(s);
            max_speed = max_speed.max(s);
        }
        let contained = self
            .current
            .iter()
            .all(|p| p.truncate().cmpge(Vec3::ZERO).all() && p.truncate().cmple(Vec3::ONE).all());
        FrameStats {
            frame,
            particle_index: self.particle_index,
            field_index: self.field_index,
            particles: self.current.len(),
            avg_speed: (sum_speed / self.current.len().max(1) as f64) as f32,
            max_speed,
            field_energy: field_energy(self.field),
            occupied_cells: occupied_cells(self.field),
            contained,
        }
    }
}

/// Owned copy of a frame, as read back from a device.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub layout: AtlasLayout,
    pub particle_radius: u32,
    pub current: Vec<Vec4>,
    pub previous: Vec<Vec4>,
    pub field: Vec<Vec4>,
    pub particle_index: u64,
    pub field_index: u64,
}

impl FrameSnapshot {
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            layout: self.layout,
            particle_radius: self.particle_radius,
            current: &self.current,
            previous: &self.previous,
            field: &self.field,
            particle_index: self.particle_index,
            field_index: self.field_index,
        }
    }
}

impl From<FrameView<'_>> for FrameSnapshot {
    fn from(view: FrameView<'_>) -> Self {
        Self {
            layout: view.layout,
            particle_radius: view.particle_radius,
            current: view.current.to_vec(),
            previous: view.previous.to_vec(),
            field: view.field.to_vec(),
            particle_index: view.particle_index,
            field_index: view.field_index,
        }
    }
}

/// Largest absolute component difference between two snapshots' particles
/// and fields.
pub fn max_abs_difference(a: &FrameSnapshot, b: &FrameSnapshot) -> (f32, f32) {
    let diff = |x: &[Vec4], y: &[Vec4]| {
        x.iter()
            .zip(y)
            .map(|(p, q)| (*p - *q).abs().max_element())
            .fold(0.0f32, f32::max)
    };
    (diff(&a.current, &b.current), diff(&a.field, &b.field))
}

/// Representative position of every cell, x outermost.
///
/// x and y are the lattice points `i/F`, `j/F`; z is mid-slice, so each
/// point maps back to its own texel for any square `F`.
pub fn field_lattice(layout: &AtlasLayout) -> Vec<Vec3> {
    lattice_cells(layout)
        .map(|cell| layout.cell_position(cell))
        .collect()
}

fn lattice_cells(layout: &AtlasLayout) -> impl Iterator<Item = UVec3> + use<> {
    let f = layout.field_radius();
    (0..f).flat_map(move |i| (0..f).flat_map(move |j| (0..f).map(move |k| UVec3::new(i, j, k))))
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameStats {
    pub frame: u64,
    pub particle_index: u64,
    pub field_index: u64,
    pub particles: usize,
    pub avg_speed: f32,
    pub max_speed: f32,
    pub field_energy: f64,
    pub occupied_cells: usize,
    /// Every particle lies inside the unit cube.
    pub contained: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(current: &'a [Vec4], previous: &'a [Vec4], field: &'a [Vec4]) -> FrameView<'a> {
        FrameView {
            layout: AtlasLayout::new(4).unwrap(),
            particle_radius: 1,
            current,
            previous,
            field,
            particle_index: 4,
            field_index: 4,
        }
    }

    #[test]
    fn colours_follow_motion() {
        let cur = [Vec4::new(0.6, 0.5, 0.5, 1.0)];
        let prev = [Vec4::new(0.5, 0.5, 0.5, 1.0)];
        let field = vec![Vec4::ZERO; 64];
        let colors = view(&cur, &prev, &field).particle_colors();
        assert!((colors[0] - Vec3::new(1.0, 0.5, 0.5)).abs().max_element() < 1e-6);
    }

    #[test]
    fn resting_particle_and_empty_field_are_grey() {
        let cur = [Vec4::new(0.5, 0.5, 0.5, 1.0)];
        let field = vec![Vec4::ZERO; 64];
        let v = view(&cur, &cur, &field);
        assert_eq!(v.particle_colors()[0], Vec3::splat(0.5));
        assert!(v.field_colors().iter().all(|c| *c == Vec3::splat(0.5)));
        assert_eq!(v.field_colors().len(), 64);
    }

    #[test]
    fn stats_flag_escaped_particles() {
        let cur = [Vec4::new(0.5, 0.5, 0.5, 1.0), Vec4::new(1.2, 0.5, 0.5, 1.0)];
        let prev = [Vec4::new(0.5, 0.5, 0.5, 1.0), Vec4::new(1.0, 0.5, 0.5, 1.0)];
        let mut field = vec![Vec4::ZERO; 64];
        field[3] = Vec4::new(0.0, 0.0, 0.0, 2.0);
        let stats = view(&cur, &prev, &field).stats(7);
        assert!(!stats.contained);
        assert_eq!(stats.frame, 7);
        assert_eq!(stats.occupied_cells, 1);
        assert_eq!(stats.field_energy, 4.0);
        assert!((stats.max_speed - 0.2).abs() < 1e-6);
        assert!((stats.avg_speed - 0.1).abs() < 1e-6);
    }

    #[test]
    fn lattice_covers_every_cell_once() {
        for f in [4, 9, 16, 25, 36, 49, 81, 100] {
            let layout = AtlasLayout::new(f).unwrap();
            let mut texels: Vec<usize> = field_lattice(&layout)
                .into_iter()
                .map(|p| layout.texel_of_position(p))
                .collect();
            texels.sort_unstable();
            texels.dedup();
            assert_eq!(texels.len(), layout.texel_count(), "F={f}");
        }
    }

    #[test]
    fn field_colors_read_each_cell_in_lattice_order() {
        let layout = AtlasLayout::new(25).unwrap();
        let mut field = vec![Vec4::ZERO; layout.texel_count()];
        // flooring (15/25)·25 in f32 lands in slice 14
        let cell = UVec3::new(3, 7, 15);
        field[layout.texel_of_cell(cell)] = Vec4::new(0.0, 0.0, 2.0, 1.0);
        let cur = [Vec4::splat(0.5)];
        let v = FrameView { layout, ..view(&cur, &cur, &field) };

        let colors = v.field_colors();
        assert_eq!(colors.len(), layout.texel_count());
        let at = ((cell.x * 25 + cell.y) * 25 + cell.z) as usize;
        assert_eq!(colors[at], Vec3::new(0.5, 0.5, 1.0));
        assert_eq!(colors.iter().filter(|c| **c != Vec3::splat(0.5)).count(), 1);
    }
}
