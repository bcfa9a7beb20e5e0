//! Particle integration against the smoothed field.

use glam::{BVec3, Vec3, Vec4};
use rayon::prelude::*;

use crate::atlas::AtlasLayout;
use crate::field::FieldSampler;

use super::StepParams;

/// Integrate every particle from its two most recent positions.
///
/// `pos0` is the newest history slot, `pos1` the one before it; `out` is
/// the slot being written this frame.
pub fn advect(
    layout: &AtlasLayout,
    params: &StepParams,
    pos0: &[Vec4],
    pos1: &[Vec4],
    field: &[Vec4],
    out: &mut [Vec4],
) {
    let sampler = FieldSampler::new(layout, field, params.sampling);
    let bounds = layout.interior();
    out.par_iter_mut()
        .zip(pos0.par_iter().zip(pos1.par_iter()))
        .for_each(|(out, (p0, p1))| {
            let p = advect_particle(&sampler, params, bounds, p0.truncate(), p1.truncate());
            *out = p.extend(1.0);
        });
}

pub fn advect_particle(
    sampler: &FieldSampler<'_>,
    params: &StepParams,
    bounds: (f32, f32),
    p0: Vec3,
    p1: Vec3,
) -> Vec3 {
    let field_velocity = sampler.sample(p0).truncate();
    let v = params.inertia_damping * (p0 - p1).lerp(field_velocity, params.field_coupling);
    let f = params.forces.scale * params.forces.at(p0, sampler.scalar_gradient(p0));
    contain(bounds, p0, p1, p0 + v + f)
}

/// Keep a proposed position inside `[lo, hi]³`.
///
/// Resolved per component: an escaping component is mirrored across `p0`;
/// if the mirror also escapes, the component falls back to `p1`; whatever
/// still escapes after that is clamped.
pub fn contain((lo, hi): (f32, f32), p0: Vec3, p1: Vec3, proposed: Vec3) -> Vec3 {
    let lo = Vec3::splat(lo);
    let hi = Vec3::splat(hi);
    let inside = |p: Vec3| -> BVec3 { p.cmpge(lo) & p.cmple(hi) };
    let p = Vec3::select(inside(proposed), proposed, 2.0 * p0 - proposed);
    let p = Vec3::select(inside(p), p, p1);
    p.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSampling;

    const BOUNDS: (f32, f32) = (0.25, 0.75);

    #[test]
    fn in_bounds_step_is_untouched() {
        let p = Vec3::new(0.4, 0.5, 0.6);
        assert_eq!(contain(BOUNDS, Vec3::splat(0.5), Vec3::splat(0.5), p), p);
    }

    #[test]
    fn escaping_component_is_mirrored() {
        let p0 = Vec3::new(0.7, 0.5, 0.5);
        let proposed = Vec3::new(0.8, 0.55, 0.5);
        let out = contain(BOUNDS, p0, p0, proposed);
        assert!((out - Vec3::new(0.6, 0.55, 0.5)).abs().max_element() < 1e-6);
    }

    #[test]
    fn failed_mirror_falls_back_to_history() {
        let p0 = Vec3::new(0.5, 0.5, 0.5);
        let p1 = Vec3::new(0.45, 0.5, 0.5);
        // a jump so large that both the step and its mirror leave the interior
        let out = contain(BOUNDS, p0, p1, Vec3::new(2.0, 0.5, 0.5));
        assert_eq!(out, Vec3::new(0.45, 0.5, 0.5));
    }

    #[test]
    fn escaped_history_is_clamped() {
        let p0 = Vec3::new(0.9, 0.5, -3.0);
        let p1 = Vec3::new(1.2, 0.5, f32::NAN);
        let out = contain(BOUNDS, p0, p1, Vec3::new(5.0, 0.5, f32::NAN));
        assert_eq!(out, Vec3::new(0.75, 0.5, 0.25));
    }

    #[test]
    fn static_particle_in_empty_field_moves_by_force_only() {
        let layout = AtlasLayout::new(4).unwrap();
        let field = vec![Vec4::ZERO; layout.texel_count()];
        let params = StepParams::default();
        let p = Vec3::new(0.5, 0.5, 0.625);
        let mut out = vec![Vec4::ZERO; 1];
        advect(&layout, &params, &[p.extend(1.0)], &[p.extend(1.0)], &field, &mut out);
        let expected = p + params.forces.scale * params.forces.at(p, Vec3::ZERO);
        assert!((out[0].truncate() - expected).abs().max_element() < 1e-7);
        assert_eq!(out[0].w, 1.0);
    }

    #[test]
    fn inertia_carries_the_last_displacement() {
        let layout = AtlasLayout::new(16).unwrap();
        let field = vec![Vec4::ZERO; layout.texel_count()];
        let sampler = FieldSampler::new(&layout, &field, FieldSampling::Nearest);
        let params = StepParams {
            forces: crate::config::ForceParams {
                swirl: 0.0,
                gradient: 0.0,
                gravity: 0.0,
                scale: 0.1,
            },
            ..StepParams::default()
        };
        let p0 = Vec3::new(0.5, 0.5, 0.5);
        let p1 = Vec3::new(0.49, 0.5, 0.5);
        let p = advect_particle(&sampler, &params, layout.interior(), p0, p1);
        // 0.95 · 0.9 · 0.01
        assert!((p.x - (0.5 + 0.00855)).abs() < 1e-6);
    }
}
