//! Dropout driven by an explicit [`PrngKey`].
//!
//! Burn's `Dropout` samples its mask from the backend RNG. Critic ensembles
//! in the training step need masks that are a pure function of the key they
//! are handed, so they use [`keyed_dropout`] instead.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::core::prng::PrngKey;

/// Inverted dropout: zero each element with probability `prob` and scale
/// survivors by `1 / (1 - prob)`.
///
/// `prob <= 0` returns the input untouched and `prob >= 1` returns zeros;
/// both consume the key without drawing from it.
pub fn keyed_dropout<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    prob: f64,
    key: PrngKey,
) -> Tensor<B, D> {
    if prob <= 0.0 {
        return input;
    }
    if prob >= 1.0 {
        return input.zeros_like();
    }

    let keep_prob = 1.0 - prob;
    let mask = key.bernoulli_mask::<B, D>(input.dims(), keep_prob, &input.device());
    input * mask.div_scalar(keep_prob)
}
