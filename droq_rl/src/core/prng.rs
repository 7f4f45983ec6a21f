//! Explicit random keys for the training step.
//!
//! A [`PrngKey`] is an opaque 128-bit token. Every stochastic operation
//! consumes a key, and splitting a key consumes it too, so the type system
//! guarantees that a key never feeds two consumers:
//!
//! ```ignore
//! let [key, noise_key, dropout_key] = key.split();
//! let noise = noise_key.normal::<B, 2>([batch, action_dim], &device);
//! ```
//!
//! Randomness is drawn on the host from `Xoshiro256PlusPlus` streams derived
//! from the key and uploaded with `Tensor::from_floats`. The backend's global
//! RNG is never read.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::{SplitMix64, Xoshiro256PlusPlus};

// Stream tags separating the uses of a key.
const SPLIT_STREAM: u64 = 0x5350_4c49_545f_4b45;
const NORMAL_STREAM: u64 = 0x4e4f_524d_414c_5f4e;
const BERNOULLI_STREAM: u64 = 0x4245_524e_4f55_4c4c;

/// Opaque random key. Not `Clone`: consuming it is the only way to use it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PrngKey {
    words: [u64; 2],
}

impl PrngKey {
    /// Create the root key for a run from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        Self {
            words: [rng.next_u64(), rng.next_u64()],
        }
    }

    /// Rebuild a key from its raw words (e.g. after persisting it).
    pub fn from_raw(words: [u64; 2]) -> Self {
        Self { words }
    }

    /// Raw words of the key. Reading them does not consume the key.
    pub fn raw(&self) -> [u64; 2] {
        self.words
    }

    /// Split into `N` independent keys, consuming `self`.
    ///
    /// By convention the first key is the continuation carried forward and
    /// the remaining keys are handed to consumers.
    pub fn split<const N: usize>(self) -> [PrngKey; N] {
        let mut rng = self.into_rng(SPLIT_STREAM);
        std::array::from_fn(|_| PrngKey {
            words: [rng.next_u64(), rng.next_u64()],
        })
    }

    /// Split into `n` keys when the count is only known at runtime.
    pub fn split_n(self, n: usize) -> Vec<PrngKey> {
        let mut rng = self.into_rng(SPLIT_STREAM);
        (0..n)
            .map(|_| PrngKey {
                words: [rng.next_u64(), rng.next_u64()],
            })
            .collect()
    }

    /// Standard-normal tensor of the given shape.
    pub fn normal<B: Backend, const D: usize>(
        self,
        shape: [usize; D],
        device: &B::Device,
    ) -> Tensor<B, D> {
        let numel: usize = shape.iter().product();
        let mut rng = self.into_rng(NORMAL_STREAM);
        let values: Vec<f32> = (0..numel)
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect();
        Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape(shape)
    }

    /// Bernoulli mask of ones (probability `keep_prob`) and zeros.
    pub fn bernoulli_mask<B: Backend, const D: usize>(
        self,
        shape: [usize; D],
        keep_prob: f64,
        device: &B::Device,
    ) -> Tensor<B, D> {
        let numel: usize = shape.iter().product();
        let mut rng = self.into_rng(BERNOULLI_STREAM);
        let values: Vec<f32> = (0..numel)
            .map(|_| if rng.gen::<f64>() < keep_prob { 1.0 } else { 0.0 })
            .collect();
        Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape(shape)
    }

    /// Derive a generator for one use of this key.
    ///
    /// Both words are whitened through SplitMix64 so that keys differing in a
    /// single bit still yield uncorrelated xoshiro states.
    fn into_rng(self, stream: u64) -> Xoshiro256PlusPlus {
        let mut lo = SplitMix64::seed_from_u64(self.words[0] ^ stream);
        let mut hi = SplitMix64::seed_from_u64(self.words[1].rotate_left(29) ^ !stream);

        let mut seed = [0u8; 32];
        seed[0..8].copy_from_slice(&lo.next_u64().to_le_bytes());
        seed[8..16].copy_from_slice(&hi.next_u64().to_le_bytes());
        seed[16..24].copy_from_slice(&lo.next_u64().to_le_bytes());
        seed[24..32].copy_from_slice(&hi.next_u64().to_le_bytes());
        Xoshiro256PlusPlus::from_seed(seed)
    }
}
