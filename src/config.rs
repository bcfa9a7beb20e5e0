use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::atlas::AtlasLayout;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_particle_radius")]
    pub particle_radius: u32,
    #[serde(default = "default_field_radius")]
    pub field_radius: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub seeding: Seeding,
    #[serde(default)]
    pub forces: ForceParams,
    #[serde(default = "default_inertia_damping")]
    pub inertia_damping: f32,
    #[serde(default = "default_field_coupling")]
    pub field_coupling: f32,
    #[serde(default = "default_diffusion_decay")]
    pub diffusion_decay: f32,
    #[serde(default = "default_splat_weight")]
    pub splat_weight: f32,
    #[serde(default)]
    pub sampling: FieldSampling,
}

fn default_particle_radius() -> u32 { 256 }
fn default_field_radius() -> u32 { 64 }
fn default_seed() -> u64 { 1 }
fn default_inertia_damping() -> f32 { 0.95 }
fn default_field_coupling() -> f32 { 0.1 }
fn default_diffusion_decay() -> f32 { 0.8 }
fn default_splat_weight() -> f32 { 1.0 }

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            particle_radius: default_particle_radius(),
            field_radius: default_field_radius(),
            seed: default_seed(),
            seeding: Seeding::default(),
            forces: ForceParams::default(),
            inertia_damping: default_inertia_damping(),
            field_coupling: default_field_coupling(),
            diffusion_decay: default_diffusion_decay(),
            splat_weight: default_splat_weight(),
            sampling: FieldSampling::default(),
        }
    }
}

impl SimConfig {
    /// Small configuration with every other field at its default.
    pub fn with_radii(particle_radius: u32, field_radius: u32) -> Self {
        Self {
            particle_radius,
            field_radius,
            ..Self::default()
        }
    }

    pub fn particle_count(&self) -> usize {
        (self.particle_radius as usize) * (self.particle_radius as usize)
    }

    /// Check every structural invariant and derive the field layout.
    pub fn validate(&self) -> Result<AtlasLayout, ConfigError> {
        if self.particle_radius == 0 {
            return Err(ConfigError::NonPositiveParticleRadius);
        }
        if self.particle_radius.checked_mul(self.particle_radius).is_none() {
            return Err(ConfigError::ParticleCountOverflow(self.particle_radius));
        }
        let layout = AtlasLayout::new(self.field_radius)?;
        self.seeding.validate()?;
        Ok(layout)
    }
}

/// Initial particle distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Seeding {
    /// x and y uniform over the interior, z fixed.
    Slab {
        #[serde(default = "default_slab_z")]
        z: f32,
    },
    /// Uniform over the interior cube.
    Volume,
    /// Every particle at one position.
    Point { position: [f32; 3] },
}

fn default_slab_z() -> f32 { 0.5 }

impl Default for Seeding {
    fn default() -> Self {
        Seeding::Slab { z: default_slab_z() }
    }
}

impl Seeding {
    fn validate(&self) -> Result<(), ConfigError> {
        let check = |axis: &'static str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::SeedOutOfRange { axis, value })
            }
        };
        match self {
            Seeding::Slab { z } => check("z", *z),
            Seeding::Volume => Ok(()),
            Seeding::Point { position } => {
                check("x", position[0])?;
                check("y", position[1])?;
                check("z", position[2])
            }
        }
    }
}

/// External force constants.
///
/// `f = swirl·(0.5 - z, 0, x - 0.5) - gradient·∇w - gravity·ŷ`, applied as
/// `scale·f` per step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceParams {
    #[serde(default = "default_swirl")]
    pub swirl: f32,
    #[serde(default = "default_gradient")]
    pub gradient: f32,
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    #[serde(default = "default_force_scale")]
    pub scale: f32,
}

fn default_swirl() -> f32 { 0.001 }
fn default_gradient() -> f32 { 0.00001 }
fn default_gravity() -> f32 { 0.001 }
fn default_force_scale() -> f32 { 0.1 }

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            swirl: default_swirl(),
            gradient: default_gradient(),
            gravity: default_gravity(),
            scale: default_force_scale(),
        }
    }
}

impl ForceParams {
    /// Force at `p` given the scalar gradient there, before `scale`.
    pub fn at(&self, p: Vec3, scalar_gradient: Vec3) -> Vec3 {
        self.swirl * Vec3::new(0.5 - p.z, 0.0, p.x - 0.5)
            - self.gradient * scalar_gradient
            - self.gravity * Vec3::Y
    }
}

/// How arbitrary positions read the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSampling {
    /// Nearest atlas texel.
    #[default]
    Nearest,
    /// Bilinear blend of the four surrounding atlas texels.
    Bilinear,
}
