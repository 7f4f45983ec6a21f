//! # DroQ-SAC: Functional Training Step for Dropout Q-Function SAC
//!
//! Training step of an off-policy actor-critic agent with a dropout +
//! layer-norm critic ensemble (DroQ, Hiraoka et al. 2022), on top of Burn.
//!
//! ## Training Call
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ReplayBatch (N rows)          PrngKey                       │
//! │        │                          │                          │
//! │        ▼                          ▼ split                    │
//! │  ┌───────────┬───────────┬─────┬───────────┐                 │
//! │  │ micro 0   │ micro 1   │ ... │ micro G-1 │                 │
//! │  └─────┬─────┴─────┬─────┴─────┴─────┬─────┘                 │
//! │        ▼           ▼                 ▼                       │
//! │   critic+soft  critic+soft  ...  critic+soft                 │
//! │                                      │                       │
//! │                                      ▼                       │
//! │                           actor (ensemble mean)              │
//! │                                      │                       │
//! │                                      ▼                       │
//! │                              temperature (α)                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All state (parameters, optimizer moments, target ensemble, entropy
//! coefficient) is passed by value and returned updated. Randomness comes
//! only from the [`PrngKey`] argument, so a call is reproducible from its
//! inputs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use droq_rl::{PrngKey, ReplayBatch, SACConfig, SAC};
//!
//! let sac = SAC::droq()?;
//! let mut state = sac.init_state::<B, _, _, _>(actor, critic, ent_coef);
//! let mut key = PrngKey::new(42);
//! let mut n_updates = 0;
//!
//! for batch in batches {
//!     let (next_state, next_key, stats) = sac.train(&batch, n_updates, state, key)?;
//!     state = next_state;
//!     key = next_key;
//!     n_updates = stats.n_updates;
//! }
//! ```

pub mod algorithms;
pub mod core;
pub mod error;
pub mod nn;

// Re-export commonly used types
pub use core::{CriticTrainState, PrngKey, ReplayBatch, TrainState, Transition};
pub use error::{Result, SACError};

pub use algorithms::continuous_policy::SquashedGaussian;
pub use algorithms::sac::{
    ActorUpdateCadence, ConstantEntropyCoefficient, EntCoefMode, EnsembleReduction,
    EntropyCoefficient, LogEntropyCoefficient, QEnsemble, SACActor, SACConfig, SACState,
    TrainStepStats, SAC,
};
pub use nn::keyed_dropout;
