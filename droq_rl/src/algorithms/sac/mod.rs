//! SAC / DroQ training step.
//!
//! The learner trains three separate modules, each with its own optimizer:
//!
//! ```text
//! Actor (squashed Gaussian policy)
//! └── obs → mean, log_std → tanh(mean + std * ε)
//!
//! Critic ensemble (K members, dropout + layer norm for DroQ)
//! ├── Q_1 … Q_K: (obs, action) → Q-value
//! └── target: Polyak-averaged copy of all members
//!
//! Entropy coefficient
//! └── log α (learned) or α (fixed)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use droq_rl::algorithms::sac::{SACConfig, SAC};
//! use droq_rl::core::PrngKey;
//!
//! let sac = SAC::new(SACConfig::droq())?;
//! let state = sac.init_state::<B, _, _, _>(actor, critic, ent_coef);
//!
//! let key = PrngKey::new(0);
//! let (state, key, stats) = sac.train(&batch, 0, state, key)?;
//! println!("{}", stats.format());
//! ```

mod config;
mod entropy_tuning;
mod sac;
mod sac_actor;
mod sac_critic;

// Re-exports
pub use config::{ActorUpdateCadence, EntCoefMode, SACConfig, TrainStepStats};
pub use entropy_tuning::{
    target_entropy_continuous, update_temperature, ConstantEntropyCoefficient,
    EntropyCoefficient, LogEntropyCoefficient,
};
pub use sac::{SACState, SAC};
pub use sac_actor::{
    clamp_log_std, sac_actor_loss, update_actor, ActorLossInfo, SACActor, LOG_STD_MAX,
    LOG_STD_MIN,
};
pub use sac_critic::{
    compute_td_target, critic_td_targets, ensemble_mse_loss, update_critic, CriticLossInfo,
    EnsembleReduction, QEnsemble,
};

#[cfg(test)]
mod test_utils;
