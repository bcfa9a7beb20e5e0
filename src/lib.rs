//! Coupled particle/field simulation in a unit cube.
//!
//! Particles splat their velocity into a 3D vector field stored as a 2D
//! atlas, the field is diffused twice, and particles are then advected by
//! the smoothed field plus external forces. [`FrameScheduler`] runs the CPU
//! frame; [`gpu::GpuSimulation`] runs the same frame with wgpu compute.

pub mod atlas;
pub mod config;
pub mod error;
pub mod field;
pub mod gpu;
pub mod kernels;
pub mod particles;
pub mod ring;
pub mod scheduler;
pub mod view;

pub use atlas::AtlasLayout;
pub use config::{FieldSampling, ForceParams, Seeding, SimConfig};
pub use error::{CapabilityError, ConfigError};
pub use field::{FieldSampler, FieldStore};
pub use kernels::StepParams;
pub use particles::ParticleStore;
pub use ring::RingBuffer;
pub use scheduler::{FrameScheduler, SimulationState};
pub use view::{FrameSnapshot, FrameStats, FrameView};
