//! Core types for the training step: keys, batches and parameter state.

pub mod batch;
pub mod prng;
pub mod target_network;
pub mod train_state;
pub mod transition;

pub use batch::ReplayBatch;
pub use prng::PrngKey;
pub use target_network::{hard_copy, soft_update};
pub use train_state::{CriticTrainState, TrainState};
pub use transition::Transition;

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};

/// Extract the single element of a one-element tensor.
pub(crate) fn tensor_to_scalar<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor.into_scalar().elem()
}
