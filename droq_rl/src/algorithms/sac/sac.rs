//! SAC / DroQ training step.
//!
//! One call consumes a replay batch and advances every piece of learner
//! state: critic ensemble, target ensemble, actor and entropy coefficient.
//!
//! # Architecture
//!
//! ```text
//! DroQ training call (gradient_steps = G, batch of N rows):
//!
//! 1. SLICE the batch into G contiguous micro-batches of N / G rows
//!
//! 2. For i in 0..G:
//!    - CRITIC UPDATE on micro-batch i:
//!        y = r + γ(1-d)(min_k Q_target_k(s', a') - α*log_π(a'|s'))
//!        minimise 0.5 * Σ_k mean (Q_k(s, a) - y)²
//!    - SOFT UPDATE: θ_target ← τ*θ + (1-τ)*θ_target
//!
//! 3. ACTOR UPDATE once, on micro-batch G-1:
//!    - Maximise E[mean_k Q_k(s, a) - α*log_π(a|s)]
//!
//! 4. TEMPERATURE UPDATE once:
//!    - Minimise α * (H(π) - H_target)
//! ```
//!
//! With the SAC preset the actor and temperature updates run after every
//! `policy_delay`-th critic step instead, using the ensemble minimum.
//!
//! Every stochastic operation takes its own [`PrngKey`] split from the key
//! passed in; the unused remainder is returned to the caller.

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;

use super::config::{SACConfig, TrainStepStats};
use super::entropy_tuning::{update_temperature, EntropyCoefficient};
use super::sac_actor::{update_actor, SACActor};
use super::sac_critic::{update_critic, QEnsemble};
use crate::core::batch::ReplayBatch;
use crate::core::prng::PrngKey;
use crate::core::train_state::{CriticTrainState, TrainState};
use crate::error::{Result, SACError};

// ============================================================================
// Learner State
// ============================================================================

/// All learner state threaded through [`SAC::train`].
#[derive(Clone)]
pub struct SACState<A, AO, Q, QO, E, EO> {
    /// Actor parameters and optimizer.
    pub actor: TrainState<A, AO>,
    /// Critic ensemble, its optimizer and the target ensemble.
    pub critic: CriticTrainState<Q, QO>,
    /// Entropy coefficient and its optimizer.
    pub ent_coef: TrainState<E, EO>,
}

impl<A, AO, Q, QO, E, EO> SACState<A, AO, Q, QO, E, EO> {
    pub fn new(
        actor: TrainState<A, AO>,
        critic: CriticTrainState<Q, QO>,
        ent_coef: TrainState<E, EO>,
    ) -> Self {
        Self {
            actor,
            critic,
            ent_coef,
        }
    }
}

// ============================================================================
// SAC Algorithm
// ============================================================================

/// SAC / DroQ learner.
///
/// Holds only the validated configuration; all trainable state lives in
/// [`SACState`] and is passed through [`SAC::train`] by value.
#[derive(Debug, Clone)]
pub struct SAC {
    config: SACConfig,
}

impl SAC {
    /// Create a learner, validating the configuration.
    pub fn new(config: SACConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Learner with the DroQ preset.
    pub fn droq() -> Result<Self> {
        Self::new(SACConfig::droq())
    }

    /// Learner with the plain SAC preset.
    pub fn sac() -> Result<Self> {
        Self::new(SACConfig::sac())
    }

    /// Get the configuration.
    pub fn config(&self) -> &SACConfig {
        &self.config
    }

    /// Build the initial learner state with Adam optimizers at the
    /// configured learning rates.
    #[allow(clippy::type_complexity)]
    pub fn init_state<B, A, Q, E>(
        &self,
        actor: A,
        critic: Q,
        ent_coef: E,
    ) -> SACState<A, impl Optimizer<A, B>, Q, impl Optimizer<Q, B>, E, impl Optimizer<E, B>>
    where
        B: AutodiffBackend,
        A: SACActor<B> + AutodiffModule<B>,
        Q: QEnsemble<B> + AutodiffModule<B>,
        E: EntropyCoefficient<B> + AutodiffModule<B>,
    {
        let config = &self.config;
        SACState::new(
            TrainState::new(
                actor,
                config.create_actor_optimizer::<B, A>(),
                config.actor_lr,
            ),
            CriticTrainState::new::<B>(
                critic,
                config.create_critic_optimizer::<B, Q>(),
                config.critic_lr,
            ),
            TrainState::new(
                ent_coef,
                config.create_ent_coef_optimizer::<B, E>(),
                config.ent_coef_lr,
            ),
        )
    }

    /// Run one training call.
    ///
    /// # Arguments
    /// - `batch`: Replay batch; its row count must be divisible by
    ///   `gradient_steps`
    /// - `n_updates`: Running critic update counter
    /// - `state`: Learner state, consumed
    /// - `key`: Random key, consumed
    ///
    /// # Returns
    /// `(new_state, remaining_key, stats)`. On error nothing has been
    /// updated; the state and key are dropped with the error.
    ///
    /// # Errors
    /// - [`SACError::ShapeMismatch`] if the batch does not split into
    ///   `gradient_steps` micro-batches or its widths disagree with the
    ///   networks
    /// - [`SACError::InvalidHyperparameter`] if the configuration is invalid
    ///   or `state.ent_coef` is learnable while `config.ent_coef` is fixed
    ///   (or the reverse)
    #[allow(clippy::type_complexity)]
    pub fn train<B, A, AO, Q, QO, E, EO>(
        &self,
        batch: &ReplayBatch<B>,
        n_updates: usize,
        state: SACState<A, AO, Q, QO, E, EO>,
        key: PrngKey,
    ) -> Result<(SACState<A, AO, Q, QO, E, EO>, PrngKey, TrainStepStats)>
    where
        B: AutodiffBackend,
        A: SACActor<B> + AutodiffModule<B>,
        AO: Optimizer<A, B>,
        Q: QEnsemble<B> + AutodiffModule<B>,
        QO: Optimizer<Q, B>,
        E: EntropyCoefficient<B> + AutodiffModule<B>,
        EO: Optimizer<E, B>,
    {
        let config = &self.config;
        config.validate()?;
        check_state(config, batch, &state)?;

        let gradient_steps = config.gradient_steps;
        let micro_batches = (0..gradient_steps)
            .map(|i| batch.micro_batch(i, gradient_steps))
            .collect::<Result<Vec<_>>>()?;
        let target_entropy = config.compute_target_entropy(state.actor.model().action_dim());

        let SACState {
            mut actor,
            mut critic,
            mut ent_coef,
        } = state;
        let mut key = key;
        let mut stats = TrainStepStats {
            n_updates,
            ..Default::default()
        };

        for (i, micro_batch) in micro_batches.iter().enumerate() {
            // Critic step followed by the target blend
            let (next_critic, critic_info, next_key) = update_critic::<B, A, E, Q, QO>(
                actor.model(),
                ent_coef.model(),
                critic,
                micro_batch,
                config.gamma,
                key,
            );
            critic = next_critic.soft_update::<B>(config.tau);
            key = next_key;

            stats.n_updates += 1;
            stats.critic_steps += 1;
            stats.critic_loss = critic_info.loss;
            stats.ent_coef_value = critic_info.ent_coef_value;
            stats.mean_q = critic_info.mean_q;

            log::trace!(
                "Critic step {}/{}: loss={:.4} mean_q={:.3} ent_coef={:.4}",
                i + 1,
                gradient_steps,
                critic_info.loss,
                critic_info.mean_q,
                critic_info.ent_coef_value
            );

            let Some(slice) = config.actor_update_cadence.actor_slice(i, gradient_steps) else {
                continue;
            };

            let observations = micro_batches[slice].observations.clone();
            let (next_actor, next_critic, actor_info, next_key) =
                update_actor::<B, A, AO, Q, QO, E>(
                    actor,
                    critic,
                    ent_coef.model(),
                    observations,
                    config.actor_q_reduction,
                    key,
                );
            actor = next_actor;
            critic = next_critic;
            key = next_key;

            let (next_ent_coef, ent_coef_loss) =
                update_temperature::<B, E, EO>(ent_coef, target_entropy, actor_info.entropy);
            ent_coef = next_ent_coef;

            stats.actor_steps += 1;
            stats.temperature_steps += 1;
            stats.actor_loss = actor_info.loss;
            stats.entropy = actor_info.entropy;
            stats.ent_coef_loss = ent_coef_loss;
        }

        log::debug!("Train step: {}", stats.format());
        if !stats.is_finite() {
            log::warn!("Non-finite training diagnostics: {}", stats.format());
        }

        Ok((SACState::new(actor, critic, ent_coef), key, stats))
    }
}

/// Batch widths must agree with the networks, and the entropy coefficient
/// with the configured mode, before anything is updated.
fn check_state<B, A, AO, Q, QO, E, EO>(
    config: &SACConfig,
    batch: &ReplayBatch<B>,
    state: &SACState<A, AO, Q, QO, E, EO>,
) -> Result<()>
where
    B: AutodiffBackend,
    A: SACActor<B>,
    Q: QEnsemble<B>,
    E: EntropyCoefficient<B>,
{
    let learnable = state.ent_coef.model().is_learnable();
    if learnable != config.ent_coef.is_auto() {
        let reason = if learnable {
            "fixed coefficient configured but the state holds a learnable one"
        } else {
            "learned coefficient configured but the state holds a fixed one"
        };
        return Err(SACError::hyperparameter(
            "ent_coef",
            config.ent_coef.initial_value() as f64,
            reason,
        ));
    }

    let actor = state.actor.model();
    let critic = state.critic.model();

    let checks = [
        ("observation width (actor)", actor.obs_size(), batch.obs_size()),
        ("observation width (critic)", critic.obs_size(), batch.obs_size()),
        ("action width (actor)", actor.action_dim(), batch.action_dim()),
        ("action width (critic)", critic.action_dim(), batch.action_dim()),
    ];
    for (what, expected, actual) in checks {
        if expected != actual {
            return Err(SACError::shape(what, expected, actual));
        }
    }
    Ok(())
}
