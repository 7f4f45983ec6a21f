//! Replay batches and their contiguous micro-batch slices.
//!
//! A batch of `N` rows is consumed as `gradient_steps` micro-batches of
//! `m = N / gradient_steps` rows each; micro-batch `i` is rows
//! `[i·m, (i+1)·m)`. Rows are never shuffled here, shuffling is the replay
//! buffer's job.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::transition::Transition;
use crate::error::{Result, SACError};

/// A batch of transitions as tensors.
///
/// - `observations`, `next_observations`: `[N, obs_size]`
/// - `actions`: `[N, action_dim]`
/// - `rewards`, `dones`: `[N]`, with `dones` in `{0, 1}`
#[derive(Debug, Clone)]
pub struct ReplayBatch<B: Backend> {
    pub observations: Tensor<B, 2>,
    pub actions: Tensor<B, 2>,
    pub next_observations: Tensor<B, 2>,
    pub rewards: Tensor<B, 1>,
    pub dones: Tensor<B, 1>,
}

impl<B: Backend> ReplayBatch<B> {
    /// Assemble a batch, checking that every leading dimension agrees and
    /// that every done flag is exactly 0 or 1.
    pub fn new(
        observations: Tensor<B, 2>,
        actions: Tensor<B, 2>,
        next_observations: Tensor<B, 2>,
        rewards: Tensor<B, 1>,
        dones: Tensor<B, 1>,
    ) -> Result<Self> {
        let [n, obs_size] = observations.dims();

        check("actions rows", n, actions.dims()[0])?;
        check("next_observations rows", n, next_observations.dims()[0])?;
        check("next_observations width", obs_size, next_observations.dims()[1])?;
        check("rewards length", n, rewards.dims()[0])?;
        check("dones length", n, dones.dims()[0])?;
        check_done_flags(&dones)?;

        Ok(Self {
            observations,
            actions,
            next_observations,
            rewards,
            dones,
        })
    }

    /// Build a batch from host transitions.
    ///
    /// The done flag is `terminal` only; truncated rows keep bootstrapping.
    pub fn from_transitions(transitions: &[Transition], device: &B::Device) -> Result<Self> {
        let first = transitions
            .first()
            .ok_or_else(|| SACError::shape("transition count (at least)", 1, 0))?;
        let batch_size = transitions.len();
        let obs_size = first.state.len();
        let action_dim = first.action.len();

        for t in transitions {
            check("transition state width", obs_size, t.state.len())?;
            check("transition next_state width", obs_size, t.next_state.len())?;
            check("transition action width", action_dim, t.action.len())?;
        }

        let states: Vec<f32> = transitions.iter().flat_map(|t| t.state.iter().copied()).collect();
        let actions: Vec<f32> = transitions.iter().flat_map(|t| t.action.iter().copied()).collect();
        let next_states: Vec<f32> = transitions
            .iter()
            .flat_map(|t| t.next_state.iter().copied())
            .collect();
        let rewards: Vec<f32> = transitions.iter().map(|t| t.reward).collect();
        let dones: Vec<f32> = transitions.iter().map(Transition::done_flag).collect();

        Self::new(
            Tensor::<B, 1>::from_floats(states.as_slice(), device).reshape([batch_size, obs_size]),
            Tensor::<B, 1>::from_floats(actions.as_slice(), device)
                .reshape([batch_size, action_dim]),
            Tensor::<B, 1>::from_floats(next_states.as_slice(), device)
                .reshape([batch_size, obs_size]),
            Tensor::from_floats(rewards.as_slice(), device),
            Tensor::from_floats(dones.as_slice(), device),
        )
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.observations.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn obs_size(&self) -> usize {
        self.observations.dims()[1]
    }

    pub fn action_dim(&self) -> usize {
        self.actions.dims()[1]
    }

    /// Rows per micro-batch when the batch is split `gradient_steps` ways.
    pub fn micro_batch_size(&self, gradient_steps: usize) -> Result<usize> {
        let n = self.len();
        if gradient_steps == 0 {
            return Err(SACError::hyperparameter(
                "gradient_steps",
                0.0,
                "must be at least 1",
            ));
        }
        if self.is_empty() {
            return Err(SACError::shape("batch rows (at least)", 1, 0));
        }
        if n % gradient_steps != 0 {
            return Err(SACError::shape(
                format!("batch rows remainder modulo gradient_steps={}", gradient_steps),
                0,
                n % gradient_steps,
            ));
        }
        Ok(n / gradient_steps)
    }

    /// Micro-batch `index` of `gradient_steps`: rows `[index·m, (index+1)·m)`.
    pub fn micro_batch(&self, index: usize, gradient_steps: usize) -> Result<Self> {
        let m = self.micro_batch_size(gradient_steps)?;
        if index >= gradient_steps {
            return Err(SACError::shape(
                "micro-batch index (upper bound)",
                gradient_steps - 1,
                index,
            ));
        }
        Ok(self.rows(index * m, (index + 1) * m))
    }

    fn rows(&self, start: usize, end: usize) -> Self {
        Self {
            observations: self.observations.clone().slice([start..end]),
            actions: self.actions.clone().slice([start..end]),
            next_observations: self.next_observations.clone().slice([start..end]),
            rewards: self.rewards.clone().slice([start..end]),
            dones: self.dones.clone().slice([start..end]),
        }
    }
}

fn check_done_flags<B: Backend>(dones: &Tensor<B, 1>) -> Result<()> {
    let invalid = dones
        .to_data()
        .iter::<f32>()
        .enumerate()
        .find(|&(_, d)| d != 0.0 && d != 1.0);

    match invalid {
        Some((row, value)) => Err(SACError::InvalidDoneFlag { row, value }),
        None => Ok(()),
    }
}

fn check(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SACError::shape(what, expected, actual))
    }
}
