//! Simulation state and the fixed per-frame pass order.

use log::{debug, info, trace};

use crate::atlas::AtlasLayout;
use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::field::FieldStore;
use crate::kernels::advect::advect;
use crate::kernels::diffuse::diffuse;
use crate::kernels::splat::{SplatAccumulator, splat};
use crate::kernels::StepParams;
use crate::particles::ParticleStore;
use crate::view::FrameView;

/// Smoothing passes per frame.
pub const DIFFUSION_PASSES: usize = 2;

/// Everything a frame reads or writes. Passes borrow it explicitly; there is
/// no other mutable simulation state.
#[derive(Debug)]
pub struct SimulationState {
    layout: AtlasLayout,
    params: StepParams,
    particles: ParticleStore,
    field: FieldStore,
    accumulator: SplatAccumulator,
    frame: u64,
}

impl SimulationState {
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        let layout = config.validate()?;
        let particles = ParticleStore::seeded(config, &layout);
        info!(
            "simulation state: {} particles, field {}^3 in a {}x{} atlas",
            particles.len(),
            layout.field_radius(),
            layout.size(),
            layout.size()
        );
        Ok(Self::from_parts(layout, StepParams::from(config), particles))
    }

    pub fn from_parts(layout: AtlasLayout, params: StepParams, particles: ParticleStore) -> Self {
        Self {
            layout,
            params,
            particles,
            field: FieldStore::new(layout),
            accumulator: SplatAccumulator::new(layout.texel_count()),
            frame: 0,
        }
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn params(&self) -> &StepParams {
        &self.params
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    pub fn field(&self) -> &FieldStore {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut FieldStore {
        &mut self.field
    }

    /// Completed frames.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Read-only hand-off for renderers.
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            layout: self.layout,
            particle_radius: self.particles.radius(),
            current: self.particles.current(),
            previous: self.particles.previous(1),
            field: self.field.current(),
            particle_index: self.particles.index(),
            field_index: self.field.index(),
        }
    }
}

/// Drives frames over a [`SimulationState`].
///
/// Order is fixed: splat, rotate field and diffuse, rotate field and diffuse
/// again, rotate particles and advect. Each pass reads only slots that no
/// other pass of the same frame is writing at that moment.
pub struct FrameScheduler;

impl FrameScheduler {
    pub fn step(state: &mut SimulationState) {
        splat_pass(state);
        for _ in 0..DIFFUSION_PASSES {
            diffuse_pass(state);
        }
        advect_pass(state);
        state.frame += 1;
        debug!(
            "frame {} done: particle_index={} field_index={}",
            state.frame,
            state.particles.index(),
            state.field.index()
        );
    }

    pub fn run(state: &mut SimulationState, frames: u32) {
        for _ in 0..frames {
            Self::step(state);
        }
    }
}

/// Deposit current particle velocities into the current field slot.
pub fn splat_pass(state: &mut SimulationState) {
    trace!("splat into field slot {}", state.field.ring().slot_of(0));
    let particles = &state.particles;
    splat(
        &state.layout,
        particles.current(),
        particles.previous(1),
        &mut state.accumulator,
        state.field.current_mut(),
        state.params.splat_weight,
    );
}

/// Rotate the field ring and smooth the previous slot into the new current.
pub fn diffuse_pass(state: &mut SimulationState) {
    state.field.advance();
    trace!("diffuse into field index {}", state.field.index());
    let (dst, src) = state.field.ring_mut().current_with_previous_mut();
    diffuse(&state.layout, src, dst, state.params.diffusion_decay);
}

/// Rotate the particle ring and integrate into the new current slot.
pub fn advect_pass(state: &mut SimulationState) {
    state.particles.advance();
    trace!("advect into particle index {}", state.particles.index());
    let field = state.field.current();
    let (out, pos0, pos1) = state.particles.ring_mut().current_with_history_mut();
    advect(&state.layout, &state.params, pos0, pos1, field, out);
}
