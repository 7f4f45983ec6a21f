//! Squashed Gaussian policy distribution (SAC-style).
//!
//! Actions are `a = tanh(u)` with `u ~ N(μ, σ)`. The log probability must be
//! corrected for the change of variables:
//! ```text
//! log π(a|s) = log N(u; μ, σ) - Σ log(1 - tanh²(u))
//! ```
//!
//! Sampling is reparameterised (`u = μ + σ·ε`) with `ε` drawn from a
//! [`PrngKey`], so gradients flow into `μ` and `σ` and the draw is fully
//! determined by the key.

use burn::tensor::activation::tanh;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::core::prng::PrngKey;

// Constants for numerical stability
const LOG_STD_MIN: f32 = -20.0;
const LOG_STD_MAX: f32 = 2.0;
const EPSILON: f32 = 1e-6;

/// Diagonal Gaussian over pre-squash actions, squashed through `tanh`.
#[derive(Debug, Clone)]
pub struct SquashedGaussian<B: Backend> {
    mean: Tensor<B, 2>,
    log_std: Tensor<B, 2>,
}

impl<B: Backend> SquashedGaussian<B> {
    /// Build from mean and log standard deviation, both `[batch, action_dim]`.
    ///
    /// `log_std` is clamped to `[-20, 2]`.
    pub fn new(mean: Tensor<B, 2>, log_std: Tensor<B, 2>) -> Self {
        Self {
            mean,
            log_std: log_std.clamp(LOG_STD_MIN, LOG_STD_MAX),
        }
    }

    pub fn log_std(&self) -> Tensor<B, 2> {
        self.log_std.clone()
    }

    /// Reparameterised sample.
    ///
    /// # Returns
    /// * `(actions, log_probs)`
    ///   - actions: [batch_size, action_dim] in range (-1, 1)
    ///   - log_probs: [batch_size] (summed over action dimensions, with tanh correction)
    pub fn rsample(&self, key: PrngKey) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let noise = key.normal::<B, 2>(self.mean.dims(), &self.mean.device());
        let std = self.log_std.clone().exp();
        let pre_squash = self.mean.clone() + std * noise.clone();

        // (u - μ) / σ is exactly the noise.
        let gaussian_log_prob = gaussian_log_prob(noise, self.log_std.clone());
        let correction = squash_correction(pre_squash.clone());

        (tanh(pre_squash), gaussian_log_prob - correction)
    }

    /// Log probability of already-squashed actions: [batch_size].
    pub fn log_prob(&self, squashed_action: Tensor<B, 2>) -> Tensor<B, 1> {
        let clamped_action = squashed_action.clamp(-1.0 + EPSILON, 1.0 - EPSILON);
        let pre_squash = atanh(clamped_action);

        let std = self.log_std.clone().exp();
        let normalized = (pre_squash.clone() - self.mean.clone()) / std;
        let gaussian_log_prob = gaussian_log_prob(normalized, self.log_std.clone());

        gaussian_log_prob - squash_correction(pre_squash)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// log N(u; μ, σ) summed over action dimensions, given `z = (u - μ) / σ`.
fn gaussian_log_prob<B: Backend>(normalized: Tensor<B, 2>, log_std: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_2pi = (2.0 * std::f32::consts::PI).ln();
    let per_dim: Tensor<B, 2> = normalized
        .powf_scalar(2.0)
        .mul_scalar(-0.5)
        .sub(log_std)
        .sub_scalar(0.5 * log_2pi);
    per_dim.sum_dim(1).flatten::<1>(0, 1)
}

/// Compute tanh squashing correction: Σ log(1 - tanh²(u)).
fn squash_correction<B: Backend>(pre_squash: Tensor<B, 2>) -> Tensor<B, 1> {
    let squashed = tanh(pre_squash);
    let one_minus_sq = (-squashed.clone() * squashed + 1.0).clamp(EPSILON, 1.0);
    let log_det_per_dim: Tensor<B, 2> = one_minus_sq.log();
    log_det_per_dim.sum_dim(1).flatten::<1>(0, 1)
}

/// Inverse hyperbolic tangent: atanh(x) = 0.5 * log((1 + x) / (1 - x))
///
/// Input should be clamped to (-1, 1) before calling. At x = ±1, atanh is ±∞.
fn atanh<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let x = x.clamp(-1.0 + EPSILON, 1.0 - EPSILON);
    let one_plus_x = x.clone() + 1.0;
    let one_minus_x = -x + 1.0;
    (one_plus_x / one_minus_x).clamp(EPSILON, f32::MAX).log() * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type B = NdArray<f32>;
    type AD = Autodiff<NdArray<f32>>;

    fn floats<BB: Backend, const D: usize>(t: Tensor<BB, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().as_slice::<f32>().unwrap().to_vec()
    }

    fn dist(device: &<B as Backend>::Device) -> SquashedGaussian<B> {
        SquashedGaussian::new(
            Tensor::from_floats([[0.1, -0.3], [0.5, 0.0], [-0.2, 0.2]], device),
            Tensor::from_floats([[-0.5, -1.0], [-0.7, -0.2], [-1.2, -0.4]], device),
        )
    }

    #[test]
    fn test_rsample_shapes_and_bounds() {
        let device = Default::default();
        let (actions, log_probs) = dist(&device).rsample(PrngKey::new(0));

        assert_eq!(actions.dims(), [3, 2]);
        assert_eq!(log_probs.dims(), [3]);
        assert!(floats(actions).iter().all(|a| a.abs() < 1.0));
        assert!(floats(log_probs).iter().all(|lp| lp.is_finite()));
    }

    #[test]
    fn test_rsample_is_determined_by_key() {
        let device = Default::default();
        let d = dist(&device);
        let (a1, lp1) = d.rsample(PrngKey::new(4));
        let (a2, lp2) = d.rsample(PrngKey::new(4));
        let (a3, _) = d.rsample(PrngKey::new(5));

        assert_eq!(floats(a1.clone()), floats(a2));
        assert_eq!(floats(lp1), floats(lp2));
        assert_ne!(floats(a1), floats(a3));
    }

    #[test]
    fn test_log_prob_matches_sample_log_prob() {
        let device = Default::default();
        let d = dist(&device);
        let (actions, sampled_lp) = d.rsample(PrngKey::new(8));
        let recomputed = d.log_prob(actions);

        for (s, r) in floats(sampled_lp).iter().zip(floats(recomputed)) {
            assert!((s - r).abs() < 1e-2, "sampled {} vs recomputed {}", s, r);
        }
    }

    #[test]
    fn test_log_prob_standard_normal_at_zero() {
        let device = Default::default();
        let d = SquashedGaussian::<B>::new(
            Tensor::zeros([1, 1], &device),
            Tensor::zeros([1, 1], &device),
        );
        let lp = floats(d.log_prob(Tensor::zeros([1, 1], &device)))[0];
        // At a = 0 the Jacobian is 1, so log π = log N(0; 0, 1) = -0.5 * ln(2π).
        let expected = -0.5 * (2.0 * std::f32::consts::PI).ln();
        assert!((lp - expected).abs() < 1e-4);
    }

    #[test]
    fn test_log_std_is_clamped() {
        let device = Default::default();
        let d = SquashedGaussian::<B>::new(
            Tensor::zeros([1, 2], &device),
            Tensor::from_floats([[-100.0, 100.0]], &device),
        );
        assert_eq!(floats(d.log_std()), vec![LOG_STD_MIN, LOG_STD_MAX]);
    }

    #[test]
    fn test_rsample_gradient_reaches_mean() {
        let device = Default::default();
        let mean = Tensor::<AD, 2>::from_floats([[0.2, -0.1]], &device).require_grad();
        let log_std = Tensor::<AD, 2>::from_floats([[-1.0, -1.0]], &device).require_grad();
        let d = SquashedGaussian::new(mean.clone(), log_std.clone());

        let (actions, log_probs) = d.rsample(PrngKey::new(1));
        let loss = actions.sum() + log_probs.sum();
        let grads = loss.backward();

        assert!(mean.grad(&grads).is_some());
        assert!(log_std.grad(&grads).is_some());
    }
}
