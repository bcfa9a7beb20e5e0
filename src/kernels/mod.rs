//! Per-element pass bodies for the CPU backend.
//!
//! Each pass is a rayon map over a flat buffer and returns only once every
//! element has been written, which is the ordering barrier between passes.

pub mod advect;
pub mod diffuse;
pub mod splat;

use crate::config::{FieldSampling, ForceParams, SimConfig};

/// Tunables read by the passes, copied out of [`SimConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    pub forces: ForceParams,
    pub inertia_damping: f32,
    pub field_coupling: f32,
    pub diffusion_decay: f32,
    pub splat_weight: f32,
    pub sampling: FieldSampling,
}

impl From<&SimConfig> for StepParams {
    fn from(config: &SimConfig) -> Self {
        Self {
            forces: config.forces,
            inertia_damping: config.inertia_damping,
            field_coupling: config.field_coupling,
            diffusion_decay: config.diffusion_decay,
            splat_weight: config.splat_weight,
            sampling: config.sampling,
        }
    }
}

impl Default for StepParams {
    fn default() -> Self {
        Self::from(&SimConfig::default())
    }
}
