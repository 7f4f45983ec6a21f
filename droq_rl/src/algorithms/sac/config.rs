//! SAC / DroQ configuration and per-call statistics.
//!
//! One configuration type drives both variants; they differ in how often the
//! actor is updated and how the critic ensemble is reduced for it:
//! - **DroQ**: many critic steps per call on micro-batches, one actor step
//!   on the last micro-batch using the ensemble **mean**
//! - **SAC**: actor step after every `policy_delay`-th critic step using the
//!   ensemble **min**
//!
//! Use `SACConfig::droq()` or `SACConfig::sac()` for presets.

use std::fmt;
use std::str::FromStr;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use super::entropy_tuning::target_entropy_continuous;
use super::sac_critic::EnsembleReduction;
use crate::error::{Result, SACError};

// ============================================================================
// Entropy Coefficient Mode
// ============================================================================

/// How the entropy coefficient is obtained.
///
/// Parses the usual string forms: `"auto"` (learned, starting at 1.0),
/// `"auto_0.1"` (learned, starting at 0.1) and `"0.2"` (fixed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntCoefMode {
    /// Learned `log α`, initialised so that `α = initial`.
    Auto { initial: f32 },
    /// Constant α.
    Fixed(f32),
}

impl EntCoefMode {
    /// Whether the coefficient is learned.
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto { .. })
    }

    /// Initial (or constant) value of α.
    pub fn initial_value(&self) -> f32 {
        match *self {
            Self::Auto { initial } => initial,
            Self::Fixed(alpha) => alpha,
        }
    }
}

impl Default for EntCoefMode {
    fn default() -> Self {
        Self::Auto { initial: 1.0 }
    }
}

impl FromStr for EntCoefMode {
    type Err = SACError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || SACError::InvalidEntropyCoefficient(s.to_string());

        if let Some(rest) = s.strip_prefix("auto") {
            let initial = match rest.strip_prefix('_') {
                None if rest.is_empty() => 1.0,
                Some(init) => init.parse::<f32>().map_err(|_| invalid())?,
                None => return Err(invalid()),
            };
            if !(initial.is_finite() && initial > 0.0) {
                return Err(invalid());
            }
            return Ok(Self::Auto { initial });
        }

        let alpha = s.parse::<f32>().map_err(|_| invalid())?;
        if !(alpha.is_finite() && alpha >= 0.0) {
            return Err(invalid());
        }
        Ok(Self::Fixed(alpha))
    }
}

impl fmt::Display for EntCoefMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto { initial } if *initial == 1.0 => write!(f, "auto"),
            Self::Auto { initial } => write!(f, "auto_{}", initial),
            Self::Fixed(alpha) => write!(f, "{}", alpha),
        }
    }
}

// ============================================================================
// Actor Update Cadence
// ============================================================================

/// When the actor (and temperature) are updated within one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorUpdateCadence {
    /// Exactly one actor update after all critic steps, on the last
    /// micro-batch (DroQ).
    OncePerCall,
    /// After critic step `i`, update the actor on micro-batch `i` whenever
    /// `i % policy_delay == 0` (SAC).
    EveryCriticStep { policy_delay: usize },
}

impl ActorUpdateCadence {
    /// Micro-batch the actor trains on right after critic step
    /// `critic_step`, or `None` when no actor update follows that step.
    pub fn actor_slice(&self, critic_step: usize, gradient_steps: usize) -> Option<usize> {
        match *self {
            Self::OncePerCall => (critic_step + 1 == gradient_steps).then_some(critic_step),
            Self::EveryCriticStep { policy_delay } => {
                (policy_delay > 0 && critic_step % policy_delay == 0).then_some(critic_step)
            }
        }
    }

    /// Number of actor updates a call with `gradient_steps` critic steps makes.
    pub fn actor_updates_per_call(&self, gradient_steps: usize) -> usize {
        (0..gradient_steps)
            .filter(|&i| self.actor_slice(i, gradient_steps).is_some())
            .count()
    }
}

// ============================================================================
// SAC Configuration
// ============================================================================

/// Configuration for the SAC / DroQ training step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SACConfig {
    // ========================================================================
    // Batch Settings
    // ========================================================================
    /// Rows per call. Must be divisible by `gradient_steps`.
    pub batch_size: usize,

    /// Critic steps per call; the batch is split into this many
    /// contiguous micro-batches.
    pub gradient_steps: usize,

    // ========================================================================
    // SAC Algorithm Hyperparameters
    // ========================================================================
    /// Discount factor for future rewards.
    pub gamma: f32,

    /// Soft update coefficient for the target critic.
    pub tau: f32,

    /// Actor network learning rate.
    pub actor_lr: f64,

    /// Critic ensemble learning rate.
    pub critic_lr: f64,

    /// Entropy coefficient learning rate.
    pub ent_coef_lr: f64,

    // ========================================================================
    // Entropy Settings
    // ========================================================================
    /// Learned or fixed entropy coefficient.
    pub ent_coef: EntCoefMode,

    /// Target entropy. If None, computed as -dim(A).
    pub target_entropy: Option<f32>,

    // ========================================================================
    // Actor Update
    // ========================================================================
    pub actor_update_cadence: ActorUpdateCadence,

    /// Reduction over critic members in the actor loss.
    pub actor_q_reduction: EnsembleReduction,

    // ========================================================================
    // Critic Regularisation (consumed by network constructors)
    // ========================================================================
    /// Dropout probability inside critic members.
    pub dropout_rate: f64,

    /// Whether critic members apply layer norm after each hidden layer.
    pub layer_norm: bool,

    // ========================================================================
    // Training Settings
    // ========================================================================
    /// Maximum gradient norm for clipping. None = no clipping.
    pub max_grad_norm: Option<f32>,
}

impl Default for SACConfig {
    fn default() -> Self {
        Self::droq()
    }
}

impl SACConfig {
    /// DroQ preset (Hiraoka et al., 2022): 20 critic steps per call on a
    /// dropout + layer-norm ensemble, one actor step using the ensemble mean.
    ///
    /// A call consumes 20 micro-batches of 256 rows.
    pub fn droq() -> Self {
        Self {
            batch_size: 256 * 20,
            gradient_steps: 20,

            gamma: 0.99,
            tau: 0.005,
            actor_lr: 3e-4,
            critic_lr: 3e-4,
            ent_coef_lr: 3e-4,

            ent_coef: EntCoefMode::Auto { initial: 1.0 },
            target_entropy: None, // Auto-compute as -dim(A)

            actor_update_cadence: ActorUpdateCadence::OncePerCall,
            actor_q_reduction: EnsembleReduction::Mean,

            dropout_rate: 0.01,
            layer_norm: true,

            max_grad_norm: None,
        }
    }

    /// Plain SAC preset (Haarnoja et al., 2018): one critic step per call,
    /// actor and temperature after every critic step, min over critics.
    pub fn sac() -> Self {
        Self {
            batch_size: 256,
            gradient_steps: 1,
            actor_update_cadence: ActorUpdateCadence::EveryCriticStep { policy_delay: 1 },
            actor_q_reduction: EnsembleReduction::Min,
            dropout_rate: 0.0,
            layer_norm: false,
            ..Self::droq()
        }
    }

    /// Check every hyperparameter against its valid range.
    pub fn validate(&self) -> Result<()> {
        if self.gradient_steps < 1 {
            return Err(SACError::hyperparameter(
                "gradient_steps",
                self.gradient_steps as f64,
                "must be at least 1",
            ));
        }
        if self.batch_size < 1 {
            return Err(SACError::hyperparameter(
                "batch_size",
                self.batch_size as f64,
                "must be at least 1",
            ));
        }
        if self.batch_size % self.gradient_steps != 0 {
            return Err(SACError::shape(
                format!("batch_size remainder modulo gradient_steps={}", self.gradient_steps),
                0,
                self.batch_size % self.gradient_steps,
            ));
        }
        if !(0.0..=1.0).contains(&self.tau) {
            return Err(SACError::hyperparameter(
                "tau",
                self.tau as f64,
                "must lie in [0, 1]",
            ));
        }
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(SACError::hyperparameter(
                "gamma",
                self.gamma as f64,
                "must lie in (0, 1)",
            ));
        }
        for (name, lr) in [
            ("actor_lr", self.actor_lr),
            ("critic_lr", self.critic_lr),
            ("ent_coef_lr", self.ent_coef_lr),
        ] {
            if !(lr.is_finite() && lr > 0.0) {
                return Err(SACError::hyperparameter(name, lr, "must be positive"));
            }
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(SACError::hyperparameter(
                "dropout_rate",
                self.dropout_rate,
                "must lie in [0, 1)",
            ));
        }
        if let ActorUpdateCadence::EveryCriticStep { policy_delay } = self.actor_update_cadence {
            if policy_delay < 1 {
                return Err(SACError::hyperparameter(
                    "policy_delay",
                    policy_delay as f64,
                    "must be at least 1",
                ));
            }
        }
        match self.ent_coef {
            EntCoefMode::Auto { initial } if !(initial.is_finite() && initial > 0.0) => {
                return Err(SACError::hyperparameter(
                    "ent_coef",
                    initial as f64,
                    "initial value of a learned coefficient must be positive",
                ));
            }
            EntCoefMode::Fixed(alpha) if !(alpha.is_finite() && alpha >= 0.0) => {
                return Err(SACError::hyperparameter(
                    "ent_coef",
                    alpha as f64,
                    "fixed coefficient must be non-negative",
                ));
            }
            _ => {}
        }
        if let Some(target) = self.target_entropy {
            if !target.is_finite() {
                return Err(SACError::hyperparameter(
                    "target_entropy",
                    target as f64,
                    "must be finite",
                ));
            }
        }
        if let Some(max_norm) = self.max_grad_norm {
            if !(max_norm.is_finite() && max_norm > 0.0) {
                return Err(SACError::hyperparameter(
                    "max_grad_norm",
                    max_norm as f64,
                    "must be positive",
                ));
            }
        }
        Ok(())
    }

    /// Target entropy for an action space of `action_dim` dimensions.
    pub fn compute_target_entropy(&self, action_dim: usize) -> f32 {
        self.target_entropy
            .unwrap_or_else(|| target_entropy_continuous(action_dim))
    }

    // ========================================================================
    // Optimizers
    // ========================================================================

    fn adam_config(&self) -> AdamConfig {
        let config = AdamConfig::new().with_epsilon(1e-5);

        // Apply gradient clipping if configured
        match self.max_grad_norm {
            Some(max_norm) => {
                config.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)))
            }
            None => config,
        }
    }

    /// Adam optimizer for the actor.
    pub fn create_actor_optimizer<B, M>(&self) -> impl Optimizer<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        self.adam_config().init()
    }

    /// Adam optimizer for the critic ensemble.
    pub fn create_critic_optimizer<B, M>(&self) -> impl Optimizer<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        self.adam_config().init()
    }

    /// Adam optimizer for the entropy coefficient.
    pub fn create_ent_coef_optimizer<B, M>(&self) -> impl Optimizer<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        self.adam_config().init()
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    /// Set batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set critic steps (micro-batches) per call.
    pub fn with_gradient_steps(mut self, steps: usize) -> Self {
        self.gradient_steps = steps;
        self
    }

    /// Set discount factor.
    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set soft update coefficient.
    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    /// Set learning rates (same for all networks).
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.actor_lr = lr;
        self.critic_lr = lr;
        self.ent_coef_lr = lr;
        self
    }

    /// Set actor learning rate.
    pub fn with_actor_lr(mut self, lr: f64) -> Self {
        self.actor_lr = lr;
        self
    }

    /// Set critic learning rate.
    pub fn with_critic_lr(mut self, lr: f64) -> Self {
        self.critic_lr = lr;
        self
    }

    /// Set entropy coefficient learning rate.
    pub fn with_ent_coef_lr(mut self, lr: f64) -> Self {
        self.ent_coef_lr = lr;
        self
    }

    /// Set entropy coefficient mode.
    pub fn with_ent_coef(mut self, mode: EntCoefMode) -> Self {
        self.ent_coef = mode;
        self
    }

    /// Set target entropy explicitly.
    pub fn with_target_entropy(mut self, target: f32) -> Self {
        self.target_entropy = Some(target);
        self
    }

    /// Set actor update cadence.
    pub fn with_actor_update_cadence(mut self, cadence: ActorUpdateCadence) -> Self {
        self.actor_update_cadence = cadence;
        self
    }

    /// Set SAC cadence with the given policy delay.
    pub fn with_policy_delay(mut self, policy_delay: usize) -> Self {
        self.actor_update_cadence = ActorUpdateCadence::EveryCriticStep { policy_delay };
        self
    }

    /// Set ensemble reduction used by the actor loss.
    pub fn with_actor_q_reduction(mut self, reduction: EnsembleReduction) -> Self {
        self.actor_q_reduction = reduction;
        self
    }

    /// Set critic dropout probability.
    pub fn with_dropout_rate(mut self, rate: f64) -> Self {
        self.dropout_rate = rate;
        self
    }

    /// Enable or disable critic layer norm.
    pub fn with_layer_norm(mut self, enabled: bool) -> Self {
        self.layer_norm = enabled;
        self
    }

    /// Set gradient clipping norm.
    pub fn with_max_grad_norm(mut self, max_norm: f32) -> Self {
        self.max_grad_norm = Some(max_norm);
        self
    }
}

// ============================================================================
// Training Step Statistics
// ============================================================================

/// Diagnostics returned by one training call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainStepStats {
    /// Running critic update counter after this call.
    pub n_updates: usize,

    /// Critic loss of the last critic step.
    pub critic_loss: f32,

    /// Actor loss of the last actor step (0.0 if none ran).
    pub actor_loss: f32,

    /// Entropy coefficient used by the last critic step.
    pub ent_coef_value: f32,

    /// Temperature loss of the last temperature step (0.0 if none ran).
    pub ent_coef_loss: f32,

    /// Policy entropy estimate from the last actor step.
    pub entropy: f32,

    /// Mean online Q of the last critic step.
    pub mean_q: f32,

    /// Critic steps performed in this call.
    pub critic_steps: usize,

    /// Actor steps performed in this call.
    pub actor_steps: usize,

    /// Temperature steps performed in this call.
    pub temperature_steps: usize,
}

impl TrainStepStats {
    /// Whether every reported loss and value is finite.
    pub fn is_finite(&self) -> bool {
        [
            self.critic_loss,
            self.actor_loss,
            self.ent_coef_value,
            self.ent_coef_loss,
            self.entropy,
            self.mean_q,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Format stats for logging.
    pub fn format(&self) -> String {
        format!(
            "updates={} | critic_loss={:.4} | actor_loss={:.4} | ent_coef={:.4} | ent_coef_loss={:.4} | entropy={:.3} | mean_q={:.3} | steps c/a/t={}/{}/{}",
            self.n_updates,
            self.critic_loss,
            self.actor_loss,
            self.ent_coef_value,
            self.ent_coef_loss,
            self.entropy,
            self.mean_q,
            self.critic_steps,
            self.actor_steps,
            self.temperature_steps
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_droq_config() {
        let config = SACConfig::droq();
        assert_eq!(config.gradient_steps, 20);
        assert_eq!(config.batch_size / config.gradient_steps, 256);
        assert_eq!(config.tau, 0.005);
        assert_eq!(config.actor_q_reduction, EnsembleReduction::Mean);
        assert_eq!(config.actor_update_cadence, ActorUpdateCadence::OncePerCall);
        assert_eq!(config.dropout_rate, 0.01);
        assert!(config.layer_norm);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sac_config() {
        let config = SACConfig::sac();
        assert_eq!(config.gradient_steps, 1);
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.actor_q_reduction, EnsembleReduction::Min);
        assert_eq!(
            config.actor_update_cadence,
            ActorUpdateCadence::EveryCriticStep { policy_delay: 1 }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_is_droq() {
        assert_eq!(SACConfig::default(), SACConfig::droq());
    }

    #[test]
    fn test_target_entropy_default_and_explicit() {
        let config = SACConfig::droq();
        assert_eq!(config.compute_target_entropy(3), -3.0);

        let config = config.with_target_entropy(-5.0);
        assert_eq!(config.compute_target_entropy(3), -5.0);
    }

    #[test]
    fn test_builder_pattern() {
        let config = SACConfig::droq()
            .with_batch_size(512)
            .with_gamma(0.95)
            .with_learning_rate(1e-3)
            .with_policy_delay(2);

        assert_eq!(config.batch_size, 512);
        assert_eq!(config.gamma, 0.95);
        assert_eq!(config.actor_lr, 1e-3);
        assert_eq!(config.critic_lr, 1e-3);
        assert_eq!(config.ent_coef_lr, 1e-3);
        assert_eq!(
            config.actor_update_cadence,
            ActorUpdateCadence::EveryCriticStep { policy_delay: 2 }
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = SACConfig::droq().with_batch_size(40);

        assert!(base.clone().with_tau(1.5).validate().is_err());
        assert!(base.clone().with_tau(-0.1).validate().is_err());
        assert!(base.clone().with_gamma(1.0).validate().is_err());
        assert!(base.clone().with_gamma(0.0).validate().is_err());
        assert!(base.clone().with_gradient_steps(0).validate().is_err());
        assert!(base.clone().with_gradient_steps(3).validate().is_err());
        assert!(base.clone().with_dropout_rate(1.0).validate().is_err());
        assert!(base.clone().with_actor_lr(-1e-3).validate().is_err());
        assert!(base.clone().with_policy_delay(0).validate().is_err());
        assert!(base
            .clone()
            .with_ent_coef(EntCoefMode::Fixed(-0.1))
            .validate()
            .is_err());
        assert!(base
            .clone()
            .with_target_entropy(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_accepts_tau_bounds() {
        let base = SACConfig::droq().with_batch_size(40);
        assert!(base.clone().with_tau(0.0).validate().is_ok());
        assert!(base.with_tau(1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_error_variant() {
        let err = SACConfig::droq().with_gamma(1.2).validate().unwrap_err();
        assert!(matches!(
            err,
            SACError::InvalidHyperparameter { name: "gamma", .. }
        ));

        let err = SACConfig::droq()
            .with_batch_size(30)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SACError::ShapeMismatch { actual: 10, .. }));
    }

    #[test]
    fn test_ent_coef_parse() {
        assert_eq!("auto".parse::<EntCoefMode>().unwrap(), EntCoefMode::Auto { initial: 1.0 });
        assert_eq!(
            "auto_0.1".parse::<EntCoefMode>().unwrap(),
            EntCoefMode::Auto { initial: 0.1 }
        );
        assert_eq!("0.2".parse::<EntCoefMode>().unwrap(), EntCoefMode::Fixed(0.2));
        assert_eq!("0".parse::<EntCoefMode>().unwrap(), EntCoefMode::Fixed(0.0));
    }

    #[test]
    fn test_ent_coef_parse_rejects_garbage() {
        for bad in ["", "automatic", "auto_", "auto_x", "auto_0", "auto_-1", "-0.5", "abc", "inf"] {
            assert_eq!(
                bad.parse::<EntCoefMode>().unwrap_err(),
                SACError::InvalidEntropyCoefficient(bad.to_string()),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_ent_coef_display_roundtrip() {
        for mode in [
            EntCoefMode::Auto { initial: 1.0 },
            EntCoefMode::Auto { initial: 0.1 },
            EntCoefMode::Fixed(0.2),
        ] {
            assert_eq!(mode.to_string().parse::<EntCoefMode>().unwrap(), mode);
        }
        assert_eq!(EntCoefMode::Auto { initial: 1.0 }.to_string(), "auto");
    }

    #[test]
    fn test_cadence_once_per_call() {
        let cadence = ActorUpdateCadence::OncePerCall;
        let slices: Vec<Option<usize>> = (0..20).map(|i| cadence.actor_slice(i, 20)).collect();

        assert_eq!(slices[19], Some(19));
        assert!(slices[..19].iter().all(Option::is_none));
        assert_eq!(cadence.actor_updates_per_call(20), 1);
        assert_eq!(cadence.actor_updates_per_call(1), 1);
    }

    #[test]
    fn test_cadence_policy_delay() {
        let cadence = ActorUpdateCadence::EveryCriticStep { policy_delay: 2 };
        assert_eq!(cadence.actor_slice(0, 5), Some(0));
        assert_eq!(cadence.actor_slice(1, 5), None);
        assert_eq!(cadence.actor_slice(4, 5), Some(4));
        assert_eq!(cadence.actor_updates_per_call(5), 3);
    }

    #[test]
    fn test_stats_is_finite_and_format() {
        let mut stats = TrainStepStats {
            n_updates: 20,
            critic_loss: 1.5,
            critic_steps: 20,
            actor_steps: 1,
            temperature_steps: 1,
            ..Default::default()
        };
        assert!(stats.is_finite());
        assert!(stats.format().contains("updates=20"));
        assert!(stats.format().contains("steps c/a/t=20/1/1"));

        stats.actor_loss = f32::NAN;
        assert!(!stats.is_finite());
    }

    #[test]
    fn test_config_serde_roundtrip_fields() {
        fn assert_serde<T: Serialize + for<'de> Deserialize<'de>>() {}
        assert_serde::<SACConfig>();
        assert_serde::<EntCoefMode>();
        assert_serde::<ActorUpdateCadence>();
    }
}
