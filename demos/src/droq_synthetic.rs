//! DroQ / SAC on synthetic point-mass transitions.
//!
//! No environment loop: every call receives a freshly sampled batch of
//! uniformly random transitions of a 2D point mass, which is enough to watch
//! the losses and the entropy coefficient move.
//!
//! # Architecture
//!
//! ```text
//! Actor Network:
//! ├── hidden: Linear → ReLU (×2)
//! ├── mean_head: Linear → mean [batch, action_dim]
//! └── log_std_head: Linear → clamp → log_std [batch, action_dim]
//!
//! Critic Ensemble (K members, DroQ):
//! └── member_k: concat(obs, action)
//!       → [Linear → Dropout → LayerNorm → ReLU] ×2
//!       → Linear → Q_k [batch]
//! ```
//!
//! # Point Mass
//!
//! - Observation: [x, y, vx, vy]
//! - Action: acceleration in [-1, 1]²
//! - Reward: -|next position|² - 0.01 |action|²
//! - Terminal when the mass ends within 0.1 of the origin

use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Module};
use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use droq_rl::algorithms::sac::clamp_log_std;
use droq_rl::{
    keyed_dropout, ConstantEntropyCoefficient, EntCoefMode, EntropyCoefficient,
    LogEntropyCoefficient, PrngKey, QEnsemble, ReplayBatch, SACActor, SACConfig, SquashedGaussian,
    Transition, SAC,
};

// ============================================================================
// Backend Type
// ============================================================================

type B = Autodiff<NdArray<f32>>;

const OBS_SIZE: usize = 4;
const ACTION_DIM: usize = 2;
const HIDDEN: usize = 64;
const N_HIDDEN_LAYERS: usize = 2;
const ENSEMBLE_SIZE: usize = 2;
const N_CALLS: usize = 25;
const LOG_EVERY: usize = 5;
const SEED: u64 = 42;

// ============================================================================
// Critic Ensemble
// ============================================================================

/// One critic member: an MLP with dropout and optional layer norm after each
/// hidden layer.
#[derive(Module, Debug)]
pub struct DroQMember<B: Backend> {
    hidden: Vec<Linear<B>>,
    norms: Vec<LayerNorm<B>>,
    head: Linear<B>,
    #[module(skip)]
    dropout_rate: f64,
}

impl<B: Backend> DroQMember<B> {
    pub fn new(d_input: usize, dropout_rate: f64, layer_norm: bool, device: &B::Device) -> Self {
        let hidden = (0..N_HIDDEN_LAYERS)
            .map(|i| {
                let d_in = if i == 0 { d_input } else { HIDDEN };
                LinearConfig::new(d_in, HIDDEN).init(device)
            })
            .collect();
        let norms = if layer_norm {
            (0..N_HIDDEN_LAYERS)
                .map(|_| LayerNormConfig::new(HIDDEN).init(device))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            hidden,
            norms,
            head: LinearConfig::new(HIDDEN, 1).init(device),
            dropout_rate,
        }
    }

    /// Q-values `[batch, 1]`; each hidden layer draws its own dropout mask.
    fn forward(&self, input: Tensor<B, 2>, dropout_key: PrngKey) -> Tensor<B, 2> {
        let keys = dropout_key.split_n(self.hidden.len());
        let mut x = input;

        for (i, (linear, key)) in self.hidden.iter().zip(keys).enumerate() {
            x = keyed_dropout(linear.forward(x), self.dropout_rate, key);
            if let Some(norm) = self.norms.get(i) {
                x = norm.forward(x);
            }
            x = relu(x);
        }

        self.head.forward(x)
    }
}

/// Ensemble of independently initialised [`DroQMember`]s.
#[derive(Module, Debug)]
pub struct DroQCritic<B: Backend> {
    members: Vec<DroQMember<B>>,
    #[module(skip)]
    obs_size: usize,
    #[module(skip)]
    action_dim: usize,
}

impl<B: Backend> DroQCritic<B> {
    pub fn new(config: &SACConfig, device: &B::Device) -> Self {
        let members = (0..ENSEMBLE_SIZE)
            .map(|_| {
                DroQMember::new(
                    OBS_SIZE + ACTION_DIM,
                    config.dropout_rate,
                    config.layer_norm,
                    device,
                )
            })
            .collect();

        Self {
            members,
            obs_size: OBS_SIZE,
            action_dim: ACTION_DIM,
        }
    }
}

impl<B: Backend> QEnsemble<B> for DroQCritic<B> {
    fn forward(&self, obs: Tensor<B, 2>, actions: Tensor<B, 2>, dropout_key: PrngKey) -> Tensor<B, 2> {
        let [batch_size, _] = obs.dims();
        let input = Tensor::cat(vec![obs, actions], 1);
        let keys = dropout_key.split_n(self.members.len());

        let q_values: Vec<Tensor<B, 2>> = self
            .members
            .iter()
            .zip(keys)
            .map(|(member, key)| member.forward(input.clone(), key).reshape([1, batch_size]))
            .collect();

        Tensor::cat(q_values, 0)
    }

    fn ensemble_size(&self) -> usize {
        self.members.len()
    }

    fn obs_size(&self) -> usize {
        self.obs_size
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Squashed Gaussian policy MLP.
#[derive(Module, Debug)]
pub struct GaussianActor<B: Backend> {
    hidden: Vec<Linear<B>>,
    mean_head: Linear<B>,
    log_std_head: Linear<B>,
    #[module(skip)]
    obs_size: usize,
    #[module(skip)]
    action_dim: usize,
}

impl<B: Backend> GaussianActor<B> {
    pub fn new(device: &B::Device) -> Self {
        let hidden = (0..N_HIDDEN_LAYERS)
            .map(|i| {
                let d_in = if i == 0 { OBS_SIZE } else { HIDDEN };
                LinearConfig::new(d_in, HIDDEN).init(device)
            })
            .collect();

        Self {
            hidden,
            mean_head: LinearConfig::new(HIDDEN, ACTION_DIM).init(device),
            log_std_head: LinearConfig::new(HIDDEN, ACTION_DIM).init(device),
            obs_size: OBS_SIZE,
            action_dim: ACTION_DIM,
        }
    }
}

impl<B: Backend> SACActor<B> for GaussianActor<B> {
    fn forward(&self, obs: Tensor<B, 2>) -> SquashedGaussian<B> {
        let x = self
            .hidden
            .iter()
            .fold(obs, |x, linear| relu(linear.forward(x)));

        let mean = self.mean_head.forward(x.clone());
        let log_std = clamp_log_std(self.log_std_head.forward(x));

        SquashedGaussian::new(mean, log_std)
    }

    fn obs_size(&self) -> usize {
        self.obs_size
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }
}

// ============================================================================
// Synthetic Transitions
// ============================================================================

fn synthetic_transition(rng: &mut Xoshiro256PlusPlus) -> Transition {
    let state: Vec<f32> = (0..OBS_SIZE).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let action: Vec<f32> = (0..ACTION_DIM).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let vx = 0.9 * state[2] + 0.1 * action[0];
    let vy = 0.9 * state[3] + 0.1 * action[1];
    let next_state = vec![state[0] + 0.1 * vx, state[1] + 0.1 * vy, vx, vy];

    let dist_sq = next_state[0].powi(2) + next_state[1].powi(2);
    let effort = action.iter().map(|a| a * a).sum::<f32>();
    let reward = -dist_sq - 0.01 * effort;

    let terminal = dist_sq < 0.01;
    let truncated = !terminal && rng.gen_bool(0.01);

    Transition::new(state, action, reward, next_state, terminal, truncated)
}

fn synthetic_batch(
    rng: &mut Xoshiro256PlusPlus,
    batch_size: usize,
    device: &<B as Backend>::Device,
) -> droq_rl::Result<ReplayBatch<B>> {
    let transitions: Vec<Transition> = (0..batch_size).map(|_| synthetic_transition(rng)).collect();
    ReplayBatch::from_transitions(&transitions, device)
}

// ============================================================================
// Training
// ============================================================================

pub fn run(name: &str, config: SACConfig) {
    let device = <B as Backend>::Device::default();

    match config.ent_coef {
        EntCoefMode::Auto { initial } => {
            train(name, config, LogEntropyCoefficient::<B>::new(initial, &device))
        }
        EntCoefMode::Fixed(alpha) => {
            train(name, config, ConstantEntropyCoefficient::<B>::new(alpha, &device))
        }
    }
}

fn train<E>(name: &str, config: SACConfig, ent_coef: E)
where
    E: EntropyCoefficient<B> + AutodiffModule<B>,
{
    let device = <B as Backend>::Device::default();

    let sac = match SAC::new(config) {
        Ok(sac) => sac,
        Err(e) => {
            println!("Invalid configuration: {}", e);
            return;
        }
    };
    let config = sac.config();

    println!("=== {} on synthetic point-mass transitions ===", name);
    println!(
        "batch_size={} gradient_steps={} ensemble={} dropout={} layer_norm={} ent_coef={}",
        config.batch_size,
        config.gradient_steps,
        ENSEMBLE_SIZE,
        config.dropout_rate,
        config.layer_norm,
        config.ent_coef
    );
    println!();

    let actor = GaussianActor::<B>::new(&device);
    let critic = DroQCritic::<B>::new(config, &device);
    let mut state = sac.init_state::<B, _, _, _>(actor, critic, ent_coef);

    let mut key = PrngKey::new(SEED);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(SEED);
    let mut n_updates = 0;

    for call in 0..N_CALLS {
        let batch = match synthetic_batch(&mut rng, config.batch_size, &device) {
            Ok(batch) => batch,
            Err(e) => {
                println!("Failed to build batch: {}", e);
                return;
            }
        };

        match sac.train(&batch, n_updates, state, key) {
            Ok((next_state, next_key, stats)) => {
                state = next_state;
                key = next_key;
                n_updates = stats.n_updates;

                if call % LOG_EVERY == 0 || call + 1 == N_CALLS {
                    println!("[call {:>3}] {}", call, stats.format());
                }
                if !stats.is_finite() {
                    println!("Diverged at call {}", call);
                    return;
                }
            }
            Err(e) => {
                println!("Training step failed: {}", e);
                return;
            }
        }
    }

    println!();
    println!(
        "Done: {} critic updates, {} actor updates",
        n_updates,
        state.actor.step()
    );
}
