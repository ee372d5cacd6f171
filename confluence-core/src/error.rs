//! Configuration errors: the only fatal failures in the engine.
//!
//! Everything else degrades locally: short bar windows yield neutral scores
//! or empty results, missing advisory inputs contribute zero boost, and a
//! corrupted position snapshot is skipped, never fatal.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Scoring weights must sum to 1.0 within tolerance.
    #[error("{context} weights sum to {sum:.6}, expected 1.0 (±{tolerance})")]
    WeightSum {
        context: &'static str,
        sum: f64,
        tolerance: f64,
    },

    /// Exit urgency thresholds must be strictly increasing.
    #[error("exit thresholds must satisfy scale_out < close_now < emergency, got {scale_out} / {close_now} / {emergency}")]
    ThresholdOrder {
        scale_out: f64,
        close_now: f64,
        emergency: f64,
    },

    /// A knob that must be strictly positive or within range.
    #[error("invalid value for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Tolerance for weight-sum validation.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Validate that `weights` sum to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
pub fn validate_weight_sum(context: &'static str, weights: &[f64]) -> Result<(), ConfigError> {
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigError::WeightSum {
            context,
            sum,
            tolerance: WEIGHT_SUM_TOLERANCE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_sum_within_tolerance_passes() {
        assert!(validate_weight_sum("entry", &[0.5, 0.3, 0.2]).is_ok());
        assert!(validate_weight_sum("entry", &[0.5, 0.3, 0.2 + 5e-7]).is_ok());
    }

    #[test]
    fn weight_sum_outside_tolerance_fails() {
        let err = validate_weight_sum("entry", &[0.5, 0.3, 0.3]).unwrap_err();
        match err {
            ConfigError::WeightSum { context, sum, .. } => {
                assert_eq!(context, "entry");
                assert!((sum - 1.1).abs() < 1e-9);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
