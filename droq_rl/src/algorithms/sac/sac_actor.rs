//! SAC actor trait and the actor update.
//!
//! The actor outputs a squashed Gaussian over actions in (-1, 1). Actor and
//! critic are separate modules, allowing:
//! - Separate optimizers with different learning rates
//! - A different update cadence for the actor (once per call in DroQ)
//! - Target copies for critics only

use burn::module::{AutodiffModule, Module};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;

use super::entropy_tuning::EntropyCoefficient;
use super::sac_critic::{EnsembleReduction, QEnsemble};
use crate::algorithms::continuous_policy::SquashedGaussian;
use crate::core::prng::PrngKey;
use crate::core::tensor_to_scalar;
use crate::core::train_state::{CriticTrainState, TrainState};

// ============================================================================
// SAC Actor Trait
// ============================================================================

/// SAC actor network: observations to a squashed Gaussian policy.
pub trait SACActor<B: Backend>: Module<B> + Clone + Send + 'static {
    /// Forward pass through the actor network.
    ///
    /// # Arguments
    /// - `obs`: Observations tensor [batch, obs_dim]
    fn forward(&self, obs: Tensor<B, 2>) -> SquashedGaussian<B>;

    /// Get the observation dimension.
    fn obs_size(&self) -> usize;

    /// Get the action dimension.
    fn action_dim(&self) -> usize;

    /// Reparameterised action sample and its log probability.
    ///
    /// Returns `(actions [batch, action_dim], log_probs [batch])`.
    fn sample(&self, obs: Tensor<B, 2>, key: PrngKey) -> (Tensor<B, 2>, Tensor<B, 1>) {
        self.forward(obs).rsample(key)
    }
}

// ============================================================================
// Continuous Actor Helpers
// ============================================================================

/// Log standard deviation bounds for actor heads.
///
/// These bounds prevent numerical instability in the squashed Gaussian.
pub const LOG_STD_MIN: f32 = -5.0;
pub const LOG_STD_MAX: f32 = 2.0;

/// Clamp log_std to safe bounds.
///
/// Uses a soft clamp via tanh rescaling (from SpinningUp/Denis Yarats):
/// ```text
/// log_std = LOG_STD_MIN + 0.5 * (LOG_STD_MAX - LOG_STD_MIN) * (tanh(raw) + 1)
/// ```
pub fn clamp_log_std<B: Backend>(raw_log_std: Tensor<B, 2>) -> Tensor<B, 2> {
    let half_range = (LOG_STD_MAX - LOG_STD_MIN) / 2.0;
    let offset = LOG_STD_MIN + half_range;
    raw_log_std.tanh().mul_scalar(half_range).add_scalar(offset)
}

/// Compute actor loss for SAC.
///
/// Actor maximizes: E[Q(s, a) - α*log_π(a|s)]
/// Loss (to minimize): E[α*log_π(a|s) - Q(s, a)]
///
/// # Arguments
/// - `q`: Reduced ensemble Q for current actions [batch]
/// - `log_probs`: Log probabilities of current actions [batch]
/// - `alpha`: Current entropy coefficient (treated as a constant)
pub fn sac_actor_loss<B: Backend>(q: Tensor<B, 1>, log_probs: Tensor<B, 1>, alpha: f32) -> Tensor<B, 1> {
    (log_probs.mul_scalar(alpha) - q).mean()
}

// ============================================================================
// Actor Update
// ============================================================================

/// Scalar diagnostics of one actor update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActorLossInfo {
    pub loss: f32,
    /// `mean(-log π(a|s))` over the micro-batch.
    pub entropy: f32,
}

/// One gradient step on the actor.
///
/// The key is split three ways: the continuation, the critic dropout key and
/// the action noise key. The critic is evaluated with dropout active and its
/// members combined with `reduction`. Critic gradients produced by the
/// backward pass are discarded, so the critic state comes back unchanged.
pub fn update_actor<B, A, AO, Q, QO, E>(
    actor_state: TrainState<A, AO>,
    critic_state: CriticTrainState<Q, QO>,
    ent_coef: &E,
    observations: Tensor<B, 2>,
    reduction: EnsembleReduction,
    key: PrngKey,
) -> (TrainState<A, AO>, CriticTrainState<Q, QO>, ActorLossInfo, PrngKey)
where
    B: AutodiffBackend,
    A: SACActor<B> + AutodiffModule<B>,
    AO: Optimizer<A, B>,
    Q: QEnsemble<B>,
    E: EntropyCoefficient<B>,
{
    let [key, dropout_key, noise_key] = key.split();
    let alpha = tensor_to_scalar(ent_coef.value());

    let (actions, log_probs) = actor_state.model().sample(observations.clone(), noise_key);
    let q_values = critic_state.model().forward(observations, actions, dropout_key);
    let q = reduction.reduce(q_values);

    let entropy = -tensor_to_scalar(log_probs.clone().detach().mean());
    let loss = sac_actor_loss(q, log_probs, alpha);
    let loss_val = tensor_to_scalar(loss.clone());

    let grads = GradientsParams::from_grads(loss.backward(), actor_state.model());
    let actor_state = actor_state.apply_gradients::<B>(grads);

    let info = ActorLossInfo {
        loss: loss_val,
        entropy,
    };
    (actor_state, critic_state, info, key)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_clamp_log_std() {
        let device = <B as Backend>::Device::default();

        let raw: Tensor<B, 2> = Tensor::from_floats([[-10.0], [0.0], [10.0]], &device);
        let clamped = clamp_log_std(raw);

        let data = clamped.into_data();
        let slice: &[f32] = data.as_slice().unwrap();

        // For very negative input, tanh ≈ -1, so result ≈ LOG_STD_MIN
        assert!((slice[0] - LOG_STD_MIN).abs() < 0.01);

        let mid = (LOG_STD_MIN + LOG_STD_MAX) / 2.0;
        assert!((slice[1] - mid).abs() < 0.01);

        assert!((slice[2] - LOG_STD_MAX).abs() < 0.01);
    }

    #[test]
    fn test_sac_actor_loss() {
        let device = <B as Backend>::Device::default();

        let q: Tensor<B, 1> = Tensor::from_floats([10.0, 8.0], &device);
        let log_probs: Tensor<B, 1> = Tensor::from_floats([-1.0, -3.0], &device);

        let loss = sac_actor_loss(q, log_probs, 0.5);
        let loss_val = loss.into_data().as_slice::<f32>().unwrap()[0];

        // mean(0.5*(-1) - 10, 0.5*(-3) - 8) = mean(-10.5, -9.5) = -10.0
        assert!((loss_val - (-10.0)).abs() < 1e-5);
    }
}
