//! Parameter state threaded by value through the training step.
//!
//! `TrainState` bundles a module with its optimizer and learning rate. Each
//! update consumes the old state and returns the new one, so a caller can
//! never observe a half-applied step.

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;

use super::target_network::soft_update;

/// A trainable module together with its optimizer state.
#[derive(Clone)]
pub struct TrainState<M, O> {
    model: M,
    optimizer: O,
    learning_rate: f64,
    step: usize,
}

impl<M, O> TrainState<M, O> {
    /// Create a fresh state with zero applied steps.
    pub fn new(model: M, optimizer: O, learning_rate: f64) -> Self {
        Self {
            model,
            optimizer,
            learning_rate,
            step: 0,
        }
    }

    /// Current parameters.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Number of gradient updates applied so far.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Apply one optimizer step and return the successor state.
    pub fn apply_gradients<B>(self, grads: GradientsParams) -> Self
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let Self {
            model,
            mut optimizer,
            learning_rate,
            step,
        } = self;
        let model = optimizer.step(learning_rate, model, grads);

        Self {
            model,
            optimizer,
            learning_rate,
            step: step + 1,
        }
    }
}

/// Critic ensemble state: online parameters with optimizer, plus the target
/// copy used for bootstrapping.
///
/// The target never receives gradients. It starts as a detached copy of the
/// online parameters and only moves through [`CriticTrainState::soft_update`].
#[derive(Clone)]
pub struct CriticTrainState<M, O> {
    online: TrainState<M, O>,
    target: M,
}

impl<M, O> CriticTrainState<M, O> {
    /// Online ensemble parameters.
    pub fn model(&self) -> &M {
        self.online.model()
    }

    /// Target ensemble parameters.
    pub fn target(&self) -> &M {
        &self.target
    }

    /// Number of critic gradient updates applied so far.
    pub fn step(&self) -> usize {
        self.online.step()
    }

    /// Apply one optimizer step to the online parameters. The target is
    /// carried over untouched.
    pub fn apply_gradients<B>(self, grads: GradientsParams) -> Self
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        Self {
            online: self.online.apply_gradients::<B>(grads),
            target: self.target,
        }
    }
}

impl<M: Clone, O> CriticTrainState<M, O> {
    /// Create the state with the target initialised to a detached copy of the
    /// online parameters.
    pub fn new<B>(model: M, optimizer: O, learning_rate: f64) -> Self
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        let target = model.clone().no_grad();
        Self {
            online: TrainState::new(model, optimizer, learning_rate),
            target,
        }
    }

    /// Polyak-average the target toward the online parameters:
    /// `target ← τ·online + (1 − τ)·target`.
    pub fn soft_update<B>(self, tau: f32) -> Self
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        let target = soft_update::<B, M>(self.online.model(), self.target, tau);
        Self {
            online: self.online,
            target,
        }
    }
}
