//! Entropy coefficient (temperature) for SAC.
//!
//! SAC uses entropy regularization to encourage exploration:
//! ```text
//! J(π) = E[r + γV] + α * H(π)
//! ```
//!
//! With automatic tuning, α is learned to keep the policy entropy near a
//! target:
//! ```text
//! min_α  α * (H(π) - H_target)
//! ```
//!
//! The learnable coefficient stores `log α` so that `α = exp(log α)` stays
//! non-negative under unconstrained gradient descent.

use burn::module::{AutodiffModule, Module, Param};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;

use crate::core::tensor_to_scalar;
use crate::core::train_state::TrainState;

// ============================================================================
// Entropy Coefficient Trait
// ============================================================================

/// A non-negative entropy coefficient α.
pub trait EntropyCoefficient<B: Backend>: Module<B> + Clone + Send + 'static {
    /// Current α as a one-element tensor `[1]`.
    fn value(&self) -> Tensor<B, 1>;

    /// Whether the temperature update should step this coefficient.
    fn is_learnable(&self) -> bool;
}

/// Learnable coefficient parameterised as `α = exp(log_alpha)`.
#[derive(Module, Debug)]
pub struct LogEntropyCoefficient<B: Backend> {
    log_alpha: Param<Tensor<B, 1>>,
}

impl<B: Backend> LogEntropyCoefficient<B> {
    /// Initialize log_alpha such that exp(log_alpha) = initial_alpha.
    pub fn new(initial_alpha: f32, device: &B::Device) -> Self {
        let log_alpha = Tensor::from_floats([initial_alpha.ln()], device);
        Self {
            log_alpha: Param::from_tensor(log_alpha),
        }
    }

    pub fn log_alpha(&self) -> Tensor<B, 1> {
        self.log_alpha.val()
    }
}

impl<B: Backend> EntropyCoefficient<B> for LogEntropyCoefficient<B> {
    fn value(&self) -> Tensor<B, 1> {
        self.log_alpha.val().exp()
    }

    fn is_learnable(&self) -> bool {
        true
    }
}

/// Fixed coefficient. Never stepped and never part of a gradient.
#[derive(Module, Debug)]
pub struct ConstantEntropyCoefficient<B: Backend> {
    alpha: Param<Tensor<B, 1>>,
}

impl<B: Backend> ConstantEntropyCoefficient<B> {
    pub fn new(alpha: f32, device: &B::Device) -> Self {
        Self {
            alpha: Param::from_tensor(Tensor::from_floats([alpha], device)),
        }
        .no_grad()
    }
}

impl<B: Backend> EntropyCoefficient<B> for ConstantEntropyCoefficient<B> {
    fn value(&self) -> Tensor<B, 1> {
        self.alpha.val().detach()
    }

    fn is_learnable(&self) -> bool {
        false
    }
}

// ============================================================================
// Temperature Update
// ============================================================================

/// One gradient step on the entropy coefficient.
///
/// The loss is `α * (entropy - target_entropy)`: when the policy is more
/// random than the target, descending it shrinks α. For a fixed coefficient
/// the state is returned unchanged and only the loss is reported.
///
/// # Returns
/// `(new_state, loss)`
pub fn update_temperature<B, E, O>(
    state: TrainState<E, O>,
    target_entropy: f32,
    entropy: f32,
) -> (TrainState<E, O>, f32)
where
    B: AutodiffBackend,
    E: EntropyCoefficient<B> + AutodiffModule<B>,
    O: Optimizer<E, B>,
{
    let loss = state.model().value().mul_scalar(entropy - target_entropy);
    let loss_val = tensor_to_scalar(loss.clone());

    if !state.model().is_learnable() {
        return (state, loss_val);
    }

    let grads = GradientsParams::from_grads(loss.backward(), state.model());
    (state.apply_gradients::<B>(grads), loss_val)
}

// ============================================================================
// Entropy Helpers
// ============================================================================

/// Compute target entropy for continuous action space.
///
/// Following SAC paper: H_target = -dim(A)
pub fn target_entropy_continuous(action_dim: usize) -> f32 {
    -(action_dim as f32)
}

// ============================================================================
// Tests
// ============================================================================
