//! Damped seven-point smoothing of the field.

use glam::{IVec3, UVec3, Vec4};
use rayon::prelude::*;

use crate::atlas::AtlasLayout;

const NEIGHBOUR_WEIGHT: f32 = 1.0 / 12.0;
const SELF_WEIGHT: f32 = 0.5;

const OFFSETS: [IVec3; 6] = [
    IVec3::new(-1, 0, 0),
    IVec3::new(1, 0, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 0, -1),
    IVec3::new(0, 0, 1),
];

/// One full smoothing pass from `src` into `dst`.
pub fn diffuse(layout: &AtlasLayout, src: &[Vec4], dst: &mut [Vec4], decay: f32) {
    debug_assert_eq!(src.len(), dst.len());
    dst.par_iter_mut()
        .enumerate()
        .for_each(|(texel, out)| *out = diffuse_texel(layout, src, texel, decay));
}

/// Smoothed value of one texel.
///
/// Every read, the centre included, is clamped to cells `[1, F-1]` on each
/// axis; the outermost layer never feeds its neighbours.
pub fn diffuse_texel(layout: &AtlasLayout, src: &[Vec4], texel: usize, decay: f32) -> Vec4 {
    let cell = layout.cell_of_texel(texel).as_i64vec3();
    let read = |d: IVec3| {
        let at = cell + d.as_i64vec3();
        let clamped = UVec3::new(
            layout.clamp_interior(at.x),
            layout.clamp_interior(at.y),
            layout.clamp_interior(at.z),
        );
        src[layout.texel_of_cell(clamped)]
    };
    let neighbours = OFFSETS.iter().fold(Vec4::ZERO, |sum, d| sum + read(*d));
    decay * (neighbours * NEIGHBOUR_WEIGHT + SELF_WEIGHT * read(IVec3::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field_energy;

    fn impulse(layout: &AtlasLayout, cell: UVec3, value: Vec4) -> Vec<Vec4> {
        let mut field = vec![Vec4::ZERO; layout.texel_count()];
        field[layout.texel_of_cell(cell)] = value;
        field
    }

    #[test]
    fn single_cell_spreads_and_loses_energy() {
        let layout = AtlasLayout::new(16).unwrap();
        let centre = UVec3::new(8, 8, 8);
        let src = impulse(&layout, centre, Vec4::new(1.0, -2.0, 0.5, 3.0));
        let mut dst = vec![Vec4::ZERO; src.len()];
        diffuse(&layout, &src, &mut dst, 0.8);

        assert!(field_energy(&dst) < field_energy(&src));
        let at = |c: UVec3| dst[layout.texel_of_cell(c)];
        assert!((at(centre) - 0.4 * src[layout.texel_of_cell(centre)]).abs().max_element() < 1e-6);
        for d in OFFSETS {
            let n = (centre.as_ivec3() + d).as_uvec3();
            assert!((at(n).w - 3.0 * 0.8 / 12.0).abs() < 1e-6);
        }
        assert_eq!(at(UVec3::new(10, 8, 8)), Vec4::ZERO);
        let nonzero = dst.iter().filter(|t| **t != Vec4::ZERO).count();
        assert_eq!(nonzero, 7);
    }

    #[test]
    fn boundary_reads_clamp_inwards() {
        let layout = AtlasLayout::new(4).unwrap();
        let src = impulse(&layout, UVec3::new(1, 2, 2), Vec4::splat(1.0));
        let mut dst = vec![Vec4::ZERO; src.len()];
        diffuse(&layout, &src, &mut dst, 1.0);
        // cell 0 reads cell 1 for its centre and for both x neighbours
        let edge = dst[layout.texel_of_cell(UVec3::new(0, 2, 2))];
        assert!((edge.w - (2.0 / 12.0 + 0.5)).abs() < 1e-6);
    }

    #[test]
    fn uniform_interior_is_scaled_by_decay() {
        let layout = AtlasLayout::new(9).unwrap();
        let src = vec![Vec4::splat(2.0); layout.texel_count()];
        let mut dst = vec![Vec4::ZERO; src.len()];
        diffuse(&layout, &src, &mut dst, 0.8);
        assert!(dst.iter().all(|t| (*t - Vec4::splat(1.6)).abs().max_element() < 1e-6));
    }
}
