//! Instrumented stand-in networks for training-step tests.
//!
//! Both stubs are linear in their parameters so every quantity of a training
//! call can be computed by hand. They count their invocations and record the
//! raw words of every key they receive together with the sum of the
//! observations they were called on; clones (including the target copy)
//! share the same log.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use burn::module::{Ignored, Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use parking_lot::Mutex;

use super::sac_actor::SACActor;
use super::sac_critic::QEnsemble;
use crate::algorithms::continuous_policy::SquashedGaussian;
use crate::core::prng::PrngKey;
use crate::core::tensor_to_scalar;

/// Shared invocation log.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<AtomicUsize>,
    keys: Arc<Mutex<Vec<[u64; 2]>>>,
    observation_sums: Arc<Mutex<Vec<f32>>>,
}

impl CallLog {
    fn record<B: Backend>(&self, key: &PrngKey, obs: &Tensor<B, 2>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().push(key.raw());
        self.observation_sums
            .lock()
            .push(tensor_to_scalar(obs.clone().detach().sum()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<[u64; 2]> {
        self.keys.lock().clone()
    }

    /// Sum of the observation batch seen by each call, in call order.
    pub fn observation_sums(&self) -> Vec<f32> {
        self.observation_sums.lock().clone()
    }
}

// ============================================================================
// Stub Critic
// ============================================================================

/// `Q_k(s, a) = bias_k + weight · Σ_j a_j`, ignoring observations.
#[derive(Module, Debug)]
pub struct StubCritic<B: Backend> {
    member_bias: Param<Tensor<B, 1>>,
    weight: Param<Tensor<B, 1>>,
    #[module(skip)]
    obs_size: usize,
    #[module(skip)]
    action_dim: usize,
    log: Ignored<CallLog>,
}

impl<B: Backend> StubCritic<B> {
    pub fn new(
        member_bias: &[f32],
        weight: f32,
        obs_size: usize,
        action_dim: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            member_bias: Param::from_tensor(Tensor::from_floats(member_bias, device)),
            weight: Param::from_tensor(Tensor::from_floats([weight], device)),
            obs_size,
            action_dim,
            log: Ignored(CallLog::default()),
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log.0
    }

    pub fn member_bias(&self) -> Vec<f32> {
        self.member_bias.val().into_data().as_slice::<f32>().unwrap().to_vec()
    }

    pub fn weight(&self) -> f32 {
        self.weight.val().into_data().as_slice::<f32>().unwrap()[0]
    }
}

impl<B: Backend> QEnsemble<B> for StubCritic<B> {
    fn forward(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>, dropout_key: PrngKey) -> Tensor<B, 2> {
        self.log.0.record(&dropout_key, &obs);

        let [n, _] = obs.dims();
        let k = self.ensemble_size();
        let device = obs.device();

        let action_sum: Tensor<B, 2> = actions.sum_dim(1).reshape([1, n]);
        let scaled = action_sum.mul(self.weight.val().reshape([1, 1]));
        let bias: Tensor<B, 2> = self.member_bias.val().reshape([k, 1]);

        Tensor::<B, 2>::zeros([k, n], &device) + bias + scaled
    }

    fn ensemble_size(&self) -> usize {
        self.member_bias.val().dims()[0]
    }

    fn obs_size(&self) -> usize {
        self.obs_size
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }
}

// ============================================================================
// Stub Actor
// ============================================================================

/// Deterministic one-dimensional "policy": every sample is `mu` with log
/// probability `log_prob`, both trainable.
#[derive(Module, Debug)]
pub struct StubActor<B: Backend> {
    mu: Param<Tensor<B, 1>>,
    log_prob: Param<Tensor<B, 1>>,
    #[module(skip)]
    obs_size: usize,
    log: Ignored<CallLog>,
}

impl<B: Backend> StubActor<B> {
    pub fn new(mu: f32, log_prob: f32, obs_size: usize, device: &B::Device) -> Self {
        Self {
            mu: Param::from_tensor(Tensor::from_floats([mu], device)),
            log_prob: Param::from_tensor(Tensor::from_floats([log_prob], device)),
            obs_size,
            log: Ignored(CallLog::default()),
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log.0
    }

    pub fn mu(&self) -> f32 {
        self.mu.val().into_data().as_slice::<f32>().unwrap()[0]
    }

    pub fn log_prob(&self) -> f32 {
        self.log_prob.val().into_data().as_slice::<f32>().unwrap()[0]
    }
}

impl<B: Backend> SACActor<B> for StubActor<B> {
    fn forward(&self, obs: Tensor<B, 2>) -> SquashedGaussian<B> {
        let [n, _] = obs.dims();
        let device = obs.device();
        let mean = Tensor::<B, 2>::ones([n, 1], &device).mul(self.mu.val().reshape([1, 1]));
        SquashedGaussian::new(mean, Tensor::zeros([n, 1], &device))
    }

    fn obs_size(&self) -> usize {
        self.obs_size
    }

    fn action_dim(&self) -> usize {
        1
    }

    fn sample(&self, obs: Tensor<B, 2>, key: PrngKey) -> (Tensor<B, 2>, Tensor<B, 1>) {
        self.log.0.record(&key, &obs);

        let [n, _] = obs.dims();
        let device = obs.device();
        let actions = Tensor::<B, 2>::ones([n, 1], &device).mul(self.mu.val().reshape([1, 1]));
        let log_probs = Tensor::<B, 1>::ones([n], &device).mul(self.log_prob.val());
        (actions, log_probs)
    }
}
