//! Polyak averaging of target critic parameters.
//!
//! ```text
//! θ_target = τ * θ_online + (1 - τ) * θ_target
//! ```
//!
//! Parameters are matched by traversal order rather than by `ParamId`, so
//! any two modules with the same architecture can be blended. The result is
//! detached: targets never join an autodiff graph.

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;

// ============================================================================
// Soft Update Implementation via ModuleMapper
// ============================================================================

/// Collects every float parameter of a module, flattened to 1D.
///
/// Flattening sidesteps the const-generic rank when the tensors are stored
/// in one collection.
struct ParamExtractor<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ParamExtractor<B> {
    fn new() -> Self {
        Self { params: Vec::new() }
    }

    fn into_params(self) -> Vec<Tensor<B, 1>> {
        self.params
    }
}

impl<B: Backend> ModuleMapper<B> for ParamExtractor<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let numel: usize = val.dims().iter().product();
        self.params.push(val.reshape([numel]));
        param
    }
}

/// Blends each target parameter with the online parameter at the same
/// traversal index.
struct SoftUpdateMapper<B: Backend> {
    online_params: Vec<Tensor<B, 1>>,
    tau: f32,
    index: usize,
}

impl<B: Backend> SoftUpdateMapper<B> {
    fn new(online_params: Vec<Tensor<B, 1>>, tau: f32) -> Self {
        Self {
            online_params,
            tau,
            index: 0,
        }
    }
}

impl<B: Backend> ModuleMapper<B> for SoftUpdateMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let target_val = param.val();
        let shape = target_val.dims();
        let numel: usize = shape.iter().product();

        let idx = self.index;
        self.index += 1;

        match self.online_params.get(idx) {
            Some(online) if online.dims()[0] == numel => {
                let target_flat = target_val.reshape([numel]);
                let interpolated = online.clone().mul_scalar(self.tau)
                    + target_flat.mul_scalar(1.0 - self.tau);
                Param::initialized(param.id.clone(), interpolated.reshape(shape).detach())
            }
            // Architectures differ at this position; keep the target value.
            _ => {
                log::warn!(
                    "soft_update: no matching online parameter at index {} (shape {:?})",
                    idx,
                    shape
                );
                param
            }
        }
    }
}

/// Perform soft update (Polyak averaging) from online to target model.
///
/// * `tau == 0` returns `target` untouched (bit-identical).
/// * `tau == 1` returns a detached copy of `online`.
///
/// # Example
/// ```ignore
/// target_critic = soft_update::<B, _>(&critic, target_critic, 0.005);
/// ```
pub fn soft_update<B, M>(online: &M, target: M, tau: f32) -> M
where
    B: Backend,
    M: Module<B>,
{
    if tau == 0.0 {
        return target;
    }

    if tau == 1.0 {
        return hard_copy::<B, M>(online);
    }

    let mut extractor = ParamExtractor::new();
    let _ = online.clone().map(&mut extractor);

    let mut updater = SoftUpdateMapper::new(extractor.into_params(), tau);
    target.map(&mut updater)
}

/// Copy of `online` with gradients disabled.
pub fn hard_copy<B, M>(online: &M) -> M
where
    B: Backend,
    M: Module<B>,
{
    online.clone().no_grad()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::LinearConfig;

    type TestBackend = NdArray<f32>;

    fn as_vec<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().as_slice::<f32>().unwrap().to_vec()
    }

    #[test]
    fn test_soft_update_tau_zero_returns_target() {
        let device = <TestBackend as Backend>::Device::default();

        let online = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let before = as_vec(target.weight.val());

        let updated = soft_update::<TestBackend, _>(&online, target, 0.0);

        // Bit-identical, not merely close.
        assert_eq!(before, as_vec(updated.weight.val()));
    }

    #[test]
    fn test_soft_update_tau_one_returns_online() {
        let device = <TestBackend as Backend>::Device::default();

        let online = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4).init::<TestBackend>(&device);

        let updated = soft_update::<TestBackend, _>(&online, target, 1.0);

        assert_eq!(as_vec(online.weight.val()), as_vec(updated.weight.val()));
    }

    #[test]
    fn test_soft_update_interpolation() {
        let device = <TestBackend as Backend>::Device::default();

        let online = LinearConfig::new(4, 4).init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4).init::<TestBackend>(&device);

        let online_w = as_vec(online.weight.val());
        let target_w = as_vec(target.weight.val());

        let tau = 0.5f32;
        let updated = soft_update::<TestBackend, _>(&online, target, tau);
        let updated_w = as_vec(updated.weight.val());

        for i in 0..online_w.len() {
            let expected = tau * online_w[i] + (1.0 - tau) * target_w[i];
            assert!(
                (updated_w[i] - expected).abs() < 1e-5,
                "Expected {}, got {} at index {} (tau={})",
                expected,
                updated_w[i],
                i,
                tau
            );
        }
    }

    #[test]
    fn test_soft_update_bias() {
        let device = <TestBackend as Backend>::Device::default();

        let online = LinearConfig::new(4, 4)
            .with_bias(true)
            .init::<TestBackend>(&device);
        let target = LinearConfig::new(4, 4)
            .with_bias(true)
            .init::<TestBackend>(&device);

        let online_b = as_vec(online.bias.as_ref().unwrap().val());
        let target_b = as_vec(target.bias.as_ref().unwrap().val());

        let tau = 0.3f32;
        let updated = soft_update::<TestBackend, _>(&online, target, tau);
        let updated_b = as_vec(updated.bias.as_ref().unwrap().val());

        for i in 0..online_b.len() {
            let expected = tau * online_b[i] + (1.0 - tau) * target_b[i];
            assert!(
                (updated_b[i] - expected).abs() < 1e-5,
                "Bias soft update failed at index {}",
                i
            );
        }
    }

    #[test]
    fn test_repeated_soft_updates_converge() {
        let device = <TestBackend as Backend>::Device::default();

        let online = LinearConfig::new(3, 3).init::<TestBackend>(&device);
        let mut target = LinearConfig::new(3, 3).init::<TestBackend>(&device);

        let initial_gap: f32 = as_vec(online.weight.val())
            .iter()
            .zip(as_vec(target.weight.val()))
            .map(|(o, t)| (o - t).abs())
            .sum();

        for _ in 0..200 {
            target = soft_update::<TestBackend, _>(&online, target, 0.05);
        }

        let gap: f32 = as_vec(online.weight.val())
            .iter()
            .zip(as_vec(target.weight.val()))
            .map(|(o, t)| (o - t).abs())
            .sum();

        // (1 - 0.05)^200 ≈ 3.5e-5
        assert!(gap < initial_gap * 1e-3);
    }

    #[test]
    fn test_soft_update_detaches_autodiff_target() {
        type AD = Autodiff<TestBackend>;
        let device = <AD as Backend>::Device::default();

        let online = LinearConfig::new(2, 2).init::<AD>(&device);
        let target = LinearConfig::new(2, 2).init::<AD>(&device).no_grad();

        let updated = soft_update::<AD, _>(&online, target, 0.25);
        assert!(!updated.weight.val().is_require_grad());

        let copied = soft_update::<AD, _>(&online, updated, 1.0);
        assert!(!copied.weight.val().is_require_grad());
    }
}
