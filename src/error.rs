//! Error types for fieldswarm.

use thiserror::Error;

/// Configuration rejected at initialization.
///
/// There is no recovery path for these: the atlas mapping is only a bijection
/// when the grid sizes satisfy every check below.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Particle grid radius was zero.
    #[error("particle radius must be positive")]
    NonPositiveParticleRadius,

    /// Field grid radius was zero.
    #[error("field radius must be positive")]
    NonPositiveFieldRadius,

    /// Field grid radius cannot be tiled into a square atlas.
    #[error("field radius {0} is not a perfect square")]
    FieldRadiusNotSquare(u32),

    /// Field grid radius leaves no interior between the clamped boundaries.
    #[error("field radius {0} is too small, need at least 4")]
    FieldRadiusTooSmall(u32),

    /// `R²` does not fit the particle index type.
    #[error("particle radius {0} yields more particles than can be addressed")]
    ParticleCountOverflow(u32),

    /// Atlas side `F·√F` overflows or `F³` texels cannot be addressed.
    #[error("field radius {0} yields an atlas too large to address")]
    AtlasOverflow(u32),

    /// A seeding coordinate lies outside the unit cube.
    #[error("seed coordinate {axis} = {value} lies outside [0, 1]")]
    SeedOutOfRange {
        /// Axis name.
        axis: &'static str,
        /// Offending value.
        value: f32,
    },
}

/// The compute device cannot host the simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    /// No adapter was found for the requested backends.
    #[error("no GPU adapter available")]
    NoAdapter,

    /// A buffer exceeds the adapter's storage binding limit.
    #[error("{what} needs {required} bytes of storage, adapter allows {available}")]
    StorageTooSmall {
        /// Buffer description.
        what: &'static str,
        /// Bytes the buffer needs.
        required: u64,
        /// Bytes the adapter can bind.
        available: u64,
    },

    /// A dispatch would exceed the per-dimension workgroup limit.
    #[error("{what} needs {required} workgroups, adapter allows {available}")]
    TooManyWorkgroups {
        /// Pass description.
        what: &'static str,
        /// Workgroups the dispatch needs.
        required: u32,
        /// Adapter limit.
        available: u32,
    },
}
