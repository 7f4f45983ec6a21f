//! Critic ensemble trait and the critic update.
//!
//! A critic ensemble evaluates `K` independent Q-functions on the same
//! `(s, a)` batch and returns `[K, batch]`. DroQ members are small MLPs with
//! dropout and layer norm; the dropout mask is derived from the key passed
//! to [`QEnsemble::forward`], so the target and online evaluations of one
//! step see independent masks.

use burn::module::{AutodiffModule, Module};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::entropy_tuning::EntropyCoefficient;
use super::sac_actor::SACActor;
use crate::core::batch::ReplayBatch;
use crate::core::prng::PrngKey;
use crate::core::tensor_to_scalar;
use crate::core::train_state::CriticTrainState;

// ============================================================================
// Critic Ensemble Trait
// ============================================================================

/// Ensemble of Q-functions `Q_k(s, a)`.
pub trait QEnsemble<B: Backend>: Module<B> + Clone + Send + 'static {
    /// Evaluate every member.
    ///
    /// # Arguments
    /// - `obs`: Observations [batch, obs_size]
    /// - `actions`: Actions [batch, action_dim]
    /// - `dropout_key`: Key for this evaluation's dropout masks
    ///
    /// # Returns
    /// Q-values [ensemble_size, batch]
    fn forward(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>, dropout_key: PrngKey)
        -> Tensor<B, 2>;

    /// Number of members `K`.
    fn ensemble_size(&self) -> usize;

    fn obs_size(&self) -> usize;

    fn action_dim(&self) -> usize;
}

// ============================================================================
// Ensemble Reduction
// ============================================================================

/// How per-member Q-values are combined into one estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsembleReduction {
    /// Pessimistic minimum over members (SAC actor, all TD targets).
    Min,
    /// Ensemble mean (DroQ actor).
    Mean,
}

impl EnsembleReduction {
    /// Reduce `[K, batch]` to `[batch]`.
    pub fn reduce<B: Backend>(self, q_values: Tensor<B, 2>) -> Tensor<B, 1> {
        let reduced = match self {
            Self::Min => q_values.min_dim(0),
            Self::Mean => q_values.mean_dim(0),
        };
        reduced.flatten::<1>(0, 1)
    }
}

// ============================================================================
// Loss Helpers
// ============================================================================

/// Compute TD target for continuous SAC.
///
/// y = r + γ * (1 - done) * (min_Q(s', a') - α * log π(a'|s'))
///
/// where a' ~ π(·|s')
///
/// # Arguments
/// - `rewards`: Rewards [batch]
/// - `terminals`: Terminal flags [batch]
/// - `min_q_next`: min over target members at (s', a') [batch]
/// - `next_log_probs`: log π(a'|s') [batch]
/// - `gamma`: Discount factor
/// - `alpha`: Entropy coefficient
pub fn compute_td_target<B: Backend>(
    rewards: Tensor<B, 1>,
    terminals: Tensor<B, 1>,
    min_q_next: Tensor<B, 1>,
    next_log_probs: Tensor<B, 1>,
    gamma: f32,
    alpha: f32,
) -> Tensor<B, 1> {
    // V(s') = Q(s', a') - α * log π(a'|s')
    let v_next = min_q_next - next_log_probs.mul_scalar(alpha);

    // y = r + γ * (1 - done) * V(s')
    let not_done = terminals.mul_scalar(-1.0).add_scalar(1.0);
    rewards + not_done.mul_scalar(gamma) * v_next
}

/// Ensemble regression loss `0.5 · Σ_k mean_n (Q_k(n) - y(n))²`.
///
/// # Arguments
/// - `q_values`: [ensemble_size, batch]
/// - `targets`: TD targets [batch], broadcast over members
pub fn ensemble_mse_loss<B: Backend>(q_values: Tensor<B, 2>, targets: Tensor<B, 1>) -> Tensor<B, 1> {
    let targets: Tensor<B, 2> = targets.unsqueeze_dim(0);
    let per_member: Tensor<B, 2> = (q_values - targets).powf_scalar(2.0).mean_dim(1);
    per_member.sum().mul_scalar(0.5)
}

/// Detached TD targets for one micro-batch.
///
/// Samples a single next action per row with `noise_key` and evaluates the
/// target ensemble under `dropout_key`, reducing by the member minimum.
pub fn critic_td_targets<B, A, Q>(
    actor: &A,
    target_critic: &Q,
    batch: &ReplayBatch<B>,
    gamma: f32,
    alpha: f32,
    noise_key: PrngKey,
    dropout_key: PrngKey,
) -> Tensor<B, 1>
where
    B: Backend,
    A: SACActor<B>,
    Q: QEnsemble<B>,
{
    let (next_actions, next_log_probs) = actor.sample(batch.next_observations.clone(), noise_key);

    let next_q = target_critic.forward(
        batch.next_observations.clone(),
        next_actions.detach(),
        dropout_key,
    );
    let min_q_next = EnsembleReduction::Min.reduce(next_q);

    compute_td_target(
        batch.rewards.clone(),
        batch.dones.clone(),
        min_q_next,
        next_log_probs.detach(),
        gamma,
        alpha,
    )
    .detach()
}

// ============================================================================
// Critic Update
// ============================================================================

/// Scalar diagnostics of one critic update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CriticLossInfo {
    /// Ensemble regression loss before the step.
    pub loss: f32,
    /// Entropy coefficient used in the TD target.
    pub ent_coef_value: f32,
    /// Mean online Q over members and rows.
    pub mean_q: f32,
}

/// One gradient step on the online critic ensemble.
///
/// The key is split four ways: the continuation, the next-action noise, the
/// target ensemble's dropout and the online ensemble's dropout. Only online
/// critic parameters change; the target is left for the soft update.
pub fn update_critic<B, A, E, Q, QO>(
    actor: &A,
    ent_coef: &E,
    critic_state: CriticTrainState<Q, QO>,
    batch: &ReplayBatch<B>,
    gamma: f32,
    key: PrngKey,
) -> (CriticTrainState<Q, QO>, CriticLossInfo, PrngKey)
where
    B: AutodiffBackend,
    A: SACActor<B>,
    E: EntropyCoefficient<B>,
    Q: QEnsemble<B> + AutodiffModule<B>,
    QO: Optimizer<Q, B>,
{
    let [key, noise_key, dropout_key_target, dropout_key_current] = key.split();
    let alpha = tensor_to_scalar(ent_coef.value());

    let td_targets = critic_td_targets(
        actor,
        critic_state.target(),
        batch,
        gamma,
        alpha,
        noise_key,
        dropout_key_target,
    );

    let q_values = critic_state.model().forward(
        batch.observations.clone(),
        batch.actions.clone(),
        dropout_key_current,
    );
    let mean_q = tensor_to_scalar(q_values.clone().detach().mean());

    let loss = ensemble_mse_loss(q_values, td_targets);
    let loss_val = tensor_to_scalar(loss.clone());

    let grads = GradientsParams::from_grads(loss.backward(), critic_state.model());
    let critic_state = critic_state.apply_gradients::<B>(grads);

    let info = CriticLossInfo {
        loss: loss_val,
        ent_coef_value: alpha,
        mean_q,
    };
    (critic_state, info, key)
}

// ============================================================================
// Tests
// ============================================================================
