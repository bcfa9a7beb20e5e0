//! Flattened 3D field layout.
//!
//! A cubic field of side `F` (a perfect square) is stored as a square 2D atlas
//! of side `F·√F`. Z-slice `s` occupies tile column `s mod √F`, tile row
//! `s / √F`; inside a tile, texel `(x, y)` holds grid cell `(x, y, s)`.
//!
//! Positions map into the atlas with a half-texel inset, so the lattice point
//! `(x/F, y/F)` of a slice lands exactly on a texel centre and nearest
//! lookups never straddle a tile seam.

use glam::{UVec3, Vec2, Vec3};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    field_radius: u32,
    tiles: u32,
    size: u32,
}

impl AtlasLayout {
    pub fn new(field_radius: u32) -> Result<Self, ConfigError> {
        if field_radius == 0 {
            return Err(ConfigError::NonPositiveFieldRadius);
        }
        let tiles = f64::from(field_radius).sqrt().round() as u32;
        if tiles.checked_mul(tiles) != Some(field_radius) {
            return Err(ConfigError::FieldRadiusNotSquare(field_radius));
        }
        if field_radius < 4 {
            return Err(ConfigError::FieldRadiusTooSmall(field_radius));
        }
        let size = field_radius
            .checked_mul(tiles)
            .ok_or(ConfigError::AtlasOverflow(field_radius))?;
        // texel indices are u32 on the device
        size.checked_mul(size)
            .ok_or(ConfigError::AtlasOverflow(field_radius))?;
        Ok(Self {
            field_radius,
            tiles,
            size,
        })
    }

    /// Grid side `F`.
    pub fn field_radius(&self) -> u32 {
        self.field_radius
    }

    /// Tiles per atlas row, `√F`.
    pub fn tiles(&self) -> u32 {
        self.tiles
    }

    /// Atlas side in texels, `F·√F`.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of texels, equal to the number of grid cells `F³`.
    pub fn texel_count(&self) -> usize {
        (self.size as usize) * (self.size as usize)
    }

    /// Grid spacing `1/F`, also the width of the clamped boundary band.
    pub fn spacing(&self) -> f32 {
        1.0 / self.field_radius as f32
    }

    /// Lower and upper edge of the interior region `[1/F, 1-1/F]`.
    pub fn interior(&self) -> (f32, f32) {
        let dx = self.spacing();
        (dx, 1.0 - dx)
    }

    /// Normalized position to atlas coordinate in `[0,1]²`.
    ///
    /// The slice index is floored once and then split into tile row and
    /// column, so a position on a tile seam always resolves to one tile.
    pub fn to_atlas(&self, p: Vec3) -> Vec2 {
        let tiles = self.tiles as i32;
        let slice = (p.z * self.field_radius as f32).floor() as i32;
        let zi = slice.div_euclid(tiles);
        let zf = slice.rem_euclid(tiles);
        (Vec2::new(zf as f32, zi as f32) + Vec2::new(p.x, p.y)) / self.tiles as f32
            + Vec2::splat(0.5 / self.size as f32)
    }

    /// Normalized position to render-target clip coordinate in `[-1,1]²`.
    pub fn to_clip(&self, p: Vec3) -> Vec2 {
        2.0 * self.to_atlas(p) - Vec2::ONE
    }

    /// Inverse of [`Self::to_atlas`].
    ///
    /// The tile is chosen by the texel the coordinate falls in; x and y are
    /// recovered continuously inside it, z is reported at mid-slice.
    pub fn from_atlas(&self, uv: Vec2) -> Vec3 {
        let texel = self.texel_of_uv(uv);
        let (tx, ty) = self.texel_xy(texel);
        let f = self.field_radius as f32;
        let zf = tx / self.field_radius;
        let zi = ty / self.field_radius;
        let s = self.size as f32;
        let x = (uv.x * s - 0.5) / f - zf as f32;
        let y = (uv.y * s - 0.5) / f - zi as f32;
        let slice = zi * self.tiles + zf;
        Vec3::new(x, y, (slice as f32 + 0.5) / f)
    }

    /// Inverse of [`Self::to_clip`].
    pub fn from_clip(&self, clip: Vec2) -> Vec3 {
        self.from_atlas(0.5 * (clip + Vec2::ONE))
    }

    /// Nearest texel for an atlas coordinate, clamped to the atlas edge.
    pub fn texel_of_uv(&self, uv: Vec2) -> usize {
        let last = self.size as i64 - 1;
        let tx = ((uv.x * self.size as f32).floor() as i64).clamp(0, last) as usize;
        let ty = ((uv.y * self.size as f32).floor() as i64).clamp(0, last) as usize;
        ty * self.size as usize + tx
    }

    /// Nearest texel for a normalized position.
    pub fn texel_of_position(&self, p: Vec3) -> usize {
        self.texel_of_uv(self.to_atlas(p))
    }

    pub fn texel_xy(&self, texel: usize) -> (u32, u32) {
        let size = self.size as usize;
        ((texel % size) as u32, (texel / size) as u32)
    }

    pub fn cell_of_texel(&self, texel: usize) -> UVec3 {
        let (tx, ty) = self.texel_xy(texel);
        let f = self.field_radius;
        UVec3::new(tx % f, ty % f, (ty / f) * self.tiles + tx / f)
    }

    pub fn texel_of_cell(&self, cell: UVec3) -> usize {
        let f = self.field_radius;
        let tx = (cell.z % self.tiles) * f + cell.x;
        let ty = (cell.z / self.tiles) * f + cell.y;
        ty as usize * self.size as usize + tx as usize
    }

    /// Representative position of a grid cell.
    ///
    /// x and y sit on the lattice point that maps to the texel centre; z sits
    /// mid-slice so flooring is stable.
    pub fn cell_position(&self, cell: UVec3) -> Vec3 {
        let f = self.field_radius as f32;
        Vec3::new(cell.x as f32 / f, cell.y as f32 / f, (cell.z as f32 + 0.5) / f)
    }

    /// Clamp a signed cell coordinate to the readable interior `[1, F-1]`.
    pub fn clamp_interior(&self, c: i64) -> u32 {
        c.clamp(1, i64::from(self.field_radius) - 1) as u32
    }
}
