//! Double-buffered field storage and field reads.

use glam::{Vec2, Vec3, Vec4};

use crate::atlas::AtlasLayout;
use crate::config::FieldSampling;
use crate::ring::RingBuffer;

/// Field slots in the ring.
pub const FIELD_SLOTS: usize = 2;
/// Counter value the field ring starts from.
pub const FIELD_INITIAL_INDEX: u64 = 2;

/// Two atlas-shaped buffers of `(vx, vy, vz, w)` texels.
#[derive(Debug)]
pub struct FieldStore {
    layout: AtlasLayout,
    ring: RingBuffer<Vec<Vec4>>,
}

impl FieldStore {
    /// Zeroed field.
    pub fn new(layout: AtlasLayout) -> Self {
        let slots = (0..FIELD_SLOTS)
            .map(|_| vec![Vec4::ZERO; layout.texel_count()])
            .collect();
        Self {
            layout,
            ring: RingBuffer::new(slots, FIELD_INITIAL_INDEX),
        }
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn index(&self) -> u64 {
        self.ring.index()
    }

    pub fn current(&self) -> &[Vec4] {
        self.ring.current()
    }

    pub fn current_mut(&mut self) -> &mut [Vec4] {
        self.ring.current_mut()
    }

    pub fn previous(&self) -> &[Vec4] {
        self.ring.previous(1)
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

    pub fn sampler(&self, mode: FieldSampling) -> FieldSampler<'_> {
        FieldSampler::new(&self.layout, self.current(), mode)
    }
}

/// Read-only view of one field buffer addressed by normalized position.
#[derive(Clone, Copy)]
pub struct FieldSampler<'a> {
    layout: &'a AtlasLayout,
    texels: &'a [Vec4],
    mode: FieldSampling,
}

impl<'a> FieldSampler<'a> {
    pub fn new(layout: &'a AtlasLayout, texels: &'a [Vec4], mode: FieldSampling) -> Self {
        debug_assert_eq!(texels.len(), layout.texel_count());
        Self { layout, texels, mode }
    }

    pub fn sample(&self, p: Vec3) -> Vec4 {
        let uv = self.layout.to_atlas(p);
        match self.mode {
            FieldSampling::Nearest => self.texels[self.layout.texel_of_uv(uv)],
            FieldSampling::Bilinear => self.bilinear(uv),
        }
    }

    /// The scalar (fourth) channel at `p`.
    pub fn scalar(&self, p: Vec3) -> f32 {
        self.sample(p).w
    }

    /// Difference of the scalar channel one grid step either side of `p`,
    /// divided by one grid step.
    pub fn scalar_gradient(&self, p: Vec3) -> Vec3 {
        let dx = self.layout.spacing();
        let along = |axis: Vec3| self.scalar(p + axis * dx) - self.scalar(p - axis * dx);
        Vec3::new(along(Vec3::X), along(Vec3::Y), along(Vec3::Z)) / dx
    }

    // Matches linear texture filtering with clamp-to-edge addressing.
    fn bilinear(&self, uv: Vec2) -> Vec4 {
        let size = self.layout.size() as i64;
        let coord = uv * self.layout.size() as f32 - Vec2::splat(0.5);
        let base = coord.floor();
        let t = coord - base;
        let x0 = base.x as i64;
        let y0 = base.y as i64;
        let fetch = |x: i64, y: i64| {
            let cx = x.clamp(0, size - 1) as usize;
            let cy = y.clamp(0, size - 1) as usize;
            self.texels[cy * size as usize + cx]
        };
        let bottom = fetch(x0, y0).lerp(fetch(x0 + 1, y0), t.x);
        let top = fetch(x0, y0 + 1).lerp(fetch(x0 + 1, y0 + 1), t.x);
        bottom.lerp(top, t.y)
    }
}

/// Sum of squared texel magnitudes.
pub fn field_energy(texels: &[Vec4]) -> f64 {
    texels.iter().map(|t| f64::from(t.length_squared())).sum()
}

/// Texels whose scalar channel is non-zero.
pub fn occupied_cells(texels: &[Vec4]) -> usize {
    texels.iter().filter(|t| t.w != 0.0).count()
}
