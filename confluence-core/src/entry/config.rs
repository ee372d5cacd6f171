//! Entry-scoring configuration: sub-score weights, tuned adjustment
//! constants, and feature toggles.

use serde::{Deserialize, Serialize};

use crate::error::{validate_weight_sum, ConfigError};
use crate::levels::LevelConfig;

/// Weight of each entry sub-score. Must sum to 1.0 within 1e-6; validated at
/// scorer construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryWeights {
    pub level_proximity: f64,
    pub momentum: f64,
    pub timing: f64,
    pub price_action: f64,
    pub structure_break: f64,
    pub trend_alignment: f64,
    pub order_block: f64,
    pub session_range: f64,
}

impl Default for EntryWeights {
    fn default() -> Self {
        Self {
            level_proximity: 0.20,
            momentum: 0.15,
            timing: 0.10,
            price_action: 0.10,
            structure_break: 0.15,
            trend_alignment: 0.10,
            order_block: 0.12,
            session_range: 0.08,
        }
    }
}

impl EntryWeights {
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.level_proximity,
            self.momentum,
            self.timing,
            self.price_action,
            self.structure_break,
            self.trend_alignment,
            self.order_block,
            self.session_range,
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_weight_sum("entry", &self.as_array())
    }
}

/// Empirically tuned bonus/penalty constants. The values are behavioral
/// contracts; change them only with backtest evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryTuning {
    /// Flat penalty for trading against the macro trend.
    pub counter_trend_penalty: f64,
    /// Extra counter-trend penalty when ADX > 30 (trending market).
    pub counter_trend_adx30_penalty: f64,
    /// Further penalty on top when ADX > 40 (strong trend).
    pub counter_trend_adx40_penalty: f64,
    pub with_trend_bonus: f64,
    /// Bonus when the order-block sub-score clears its gate.
    pub order_block_bonus: f64,
    pub order_block_gate: f64,
    pub session_range_bonus: f64,
    pub session_range_gate: f64,
    /// Bonus when order-block AND session sub-scores both clear this gate.
    pub combined_confluence_bonus: f64,
    pub combined_confluence_gate: f64,
    pub bos_confirmed_bonus: f64,
    pub bos_unconfirmed_penalty: f64,
    /// Ceiling of the drift penalty, reached at `signal_drift_full_atr`
    /// beyond the free zone.
    pub signal_drift_max_penalty: f64,
    /// Drift inside this many ATRs of the original signal price is free.
    pub signal_drift_free_atr: f64,
    /// ATR distance beyond the free zone at which the penalty saturates.
    pub signal_drift_full_atr: f64,
}

impl Default for EntryTuning {
    fn default() -> Self {
        Self {
            counter_trend_penalty: 25.0,
            counter_trend_adx30_penalty: 10.0,
            counter_trend_adx40_penalty: 10.0,
            with_trend_bonus: 8.0,
            order_block_bonus: 8.0,
            order_block_gate: 0.7,
            session_range_bonus: 5.0,
            session_range_gate: 0.7,
            combined_confluence_bonus: 7.0,
            combined_confluence_gate: 0.6,
            bos_confirmed_bonus: 5.0,
            bos_unconfirmed_penalty: 10.0,
            signal_drift_max_penalty: 30.0,
            signal_drift_free_atr: 1.5,
            signal_drift_full_atr: 3.0,
        }
    }
}

/// Full entry-scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryConfig {
    pub weights: EntryWeights,
    pub tuning: EntryTuning,
    pub levels: LevelConfig,
    /// MARGINAL tier floor; also the `should_enter` cutoff.
    pub min_score_to_enter: f64,
    /// Gates `wait_for_better` / `optimal_entry` output.
    pub enable_wait_mode: bool,
    /// When set, misaligned-trend entries are downgraded a tier.
    pub require_trend_alignment: bool,
    /// EMA period used for the macro trend read.
    pub trend_ema_period: usize,
    pub adx_period: usize,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            weights: EntryWeights::default(),
            tuning: EntryTuning::default(),
            levels: LevelConfig::default(),
            min_score_to_enter: 50.0,
            enable_wait_mode: true,
            require_trend_alignment: false,
            trend_ema_period: 50,
            adx_period: 14,
        }
    }
}

impl EntryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if !(0.0..=100.0).contains(&self.min_score_to_enter) {
            return Err(ConfigError::InvalidField {
                field: "min_score_to_enter",
                message: format!("{} outside [0, 100]", self.min_score_to_enter),
            });
        }
        if self.trend_ema_period == 0 || self.adx_period == 0 {
            return Err(ConfigError::InvalidField {
                field: "trend periods",
                message: "periods must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}
