//! Error types for the SAC / DroQ training step.
//!
//! Every variant is a precondition violation detected before any parameter
//! is touched. Numerical divergence is not an error: it is reported through
//! `TrainStepStats::is_finite()`.

use std::fmt;

/// Result type for training-step operations.
pub type Result<T> = std::result::Result<T, SACError>;

/// Errors raised by configuration validation and batch checks.
#[derive(Debug, Clone, PartialEq)]
pub enum SACError {
    /// A tensor or batch dimension does not match what the update expects.
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    /// A hyperparameter lies outside its valid range.
    InvalidHyperparameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// An entropy coefficient string could not be parsed.
    InvalidEntropyCoefficient(String),
    /// A done flag is neither 0 nor 1.
    InvalidDoneFlag { row: usize, value: f32 },
}

impl SACError {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    pub(crate) fn hyperparameter(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidHyperparameter {
            name,
            value,
            reason,
        }
    }
}

impl fmt::Display for SACError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch {
                what,
                expected,
                actual,
            } => write!(f, "Shape mismatch for {}: expected {}, got {}", what, expected, actual),
            Self::InvalidHyperparameter {
                name,
                value,
                reason,
            } => write!(f, "Invalid hyperparameter '{}' = {}: {}", name, value, reason),
            Self::InvalidEntropyCoefficient(value) => write!(
                f,
                "Invalid entropy coefficient '{}': expected \"auto\", \"auto_<init>\" or a non-negative float",
                value
            ),
            Self::InvalidDoneFlag { row, value } => {
                write!(f, "Invalid done flag at row {}: {} (expected 0 or 1)", row, value)
            }
        }
    }
}

impl std::error::Error for SACError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_shape_mismatch() {
        let err = SACError::shape("batch rows divisible by gradient_steps", 0, 3);
        assert_eq!(
            err.to_string(),
            "Shape mismatch for batch rows divisible by gradient_steps: expected 0, got 3"
        );
    }

    #[test]
    fn test_display_hyperparameter() {
        let err = SACError::hyperparameter("gamma", 1.5, "must lie in (0, 1)");
        assert!(err.to_string().contains("'gamma' = 1.5"));
    }

    #[test]
    fn test_display_done_flag() {
        let err = SACError::InvalidDoneFlag { row: 3, value: 0.5 };
        assert_eq!(err.to_string(), "Invalid done flag at row 3: 0.5 (expected 0 or 1)");
    }

    #[test]
    fn test_is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&SACError::InvalidEntropyCoefficient("x".into()));
    }
}
