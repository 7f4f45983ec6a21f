//! Algorithm components.
//!
//! - `continuous_policy`: Squashed Gaussian distribution for continuous actions
//! - `sac`: SAC / DroQ training step

pub mod continuous_policy;
pub mod sac;

pub use continuous_policy::SquashedGaussian;
pub use sac::{
    ActorUpdateCadence, EntCoefMode, EnsembleReduction, SACConfig, SACState, TrainStepStats,
    SAC,
};
