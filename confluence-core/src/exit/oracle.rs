//! Exit oracle: runs the reversal ensemble per position, blends in advisory
//! boosts, scales urgency thresholds with the position's P&L state, and
//! emits graded exit decisions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Bar, ExitDecision, ExitUrgency, PositionSnapshot, Reason, ReasonCode, Ticket,
};
use crate::error::{validate_weight_sum, ConfigError};
use crate::exit::detectors::{
    BollingerBreach, ExitContext, MacdCross, ProfitGiveback, ReversalDetector, RsiExtreme,
    TrendFlip, VolumeClimax,
};
use crate::indicators::snapshot::{IndicatorSnapshot, SnapshotPeriods};

/// Ensemble weights, one per detector. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitWeights {
    pub trend_flip: f64,
    pub rsi_extreme: f64,
    pub macd_cross: f64,
    pub bollinger_breach: f64,
    pub profit_giveback: f64,
    pub volume_climax: f64,
}

impl Default for ExitWeights {
    fn default() -> Self {
        Self {
            trend_flip: 0.25,
            rsi_extreme: 0.20,
            macd_cross: 0.15,
            bollinger_breach: 0.15,
            profit_giveback: 0.15,
            volume_climax: 0.10,
        }
    }
}

impl ExitWeights {
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.trend_flip,
            self.rsi_extreme,
            self.macd_cross,
            self.bollinger_breach,
            self.profit_giveback,
            self.volume_climax,
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_weight_sum("exit", &self.as_array())
    }
}

/// Per-detector enable switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitToggles {
    pub trend_flip: bool,
    pub rsi_extreme: bool,
    pub macd_cross: bool,
    pub bollinger_breach: bool,
    pub profit_giveback: bool,
    pub volume_climax: bool,
}

impl Default for ExitToggles {
    fn default() -> Self {
        Self {
            trend_flip: true,
            rsi_extreme: true,
            macd_cross: true,
            bollinger_breach: true,
            profit_giveback: true,
            volume_climax: true,
        }
    }
}

impl ExitToggles {
    fn as_array(&self) -> [bool; 6] {
        [
            self.trend_flip,
            self.rsi_extreme,
            self.macd_cross,
            self.bollinger_breach,
            self.profit_giveback,
            self.volume_climax,
        ]
    }
}

/// Urgency thresholds over the boosted confluence. Strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitThresholds {
    pub scale_out: f64,
    pub close_now: f64,
    pub emergency: f64,
}

impl Default for ExitThresholds {
    fn default() -> Self {
        Self {
            scale_out: 0.40,
            close_now: 0.60,
            emergency: 0.80,
        }
    }
}

impl ExitThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.scale_out > 0.0
            && self.scale_out < self.close_now
            && self.close_now < self.emergency;
        if !ordered {
            return Err(ConfigError::ThresholdOrder {
                scale_out: self.scale_out,
                close_now: self.close_now,
                emergency: self.emergency,
            });
        }
        Ok(())
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            scale_out: self.scale_out * factor,
            close_now: self.close_now * factor,
            emergency: self.emergency * factor,
        }
    }
}

/// Full exit-engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitConfig {
    pub weights: ExitWeights,
    pub toggles: ExitToggles,
    pub thresholds: ExitThresholds,
    pub periods: SnapshotPeriods,
    /// P&L percent above which profit is worth protecting (thresholds ×0.9).
    pub min_profit_to_protect: f64,
    /// P&L percent below which the loss is deep (thresholds ×0.8).
    pub deep_loss_pct: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            weights: ExitWeights::default(),
            toggles: ExitToggles::default(),
            thresholds: ExitThresholds::default(),
            periods: SnapshotPeriods::default(),
            min_profit_to_protect: 2.0,
            deep_loss_pct: -5.0,
        }
    }
}

impl ExitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        Ok(())
    }
}

/// Optional read-only advisory inputs. Each is a confidence in [0,1] that
/// conditions have turned against open positions; absent collaborators
/// contribute zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryInputs {
    pub regime_change: Option<f64>,
    pub prediction_against: Option<f64>,
    pub sentiment_against: Option<f64>,
}

impl AdvisoryInputs {
    /// Regime up to 0.30, prediction up to 0.20, sentiment up to 0.15;
    /// capped at 1.0.
    fn boost(&self) -> f64 {
        let part = |c: Option<f64>, cap: f64| c.map_or(0.0, |v| v.clamp(0.0, 1.0) * cap);
        (part(self.regime_change, 0.30)
            + part(self.prediction_against, 0.20)
            + part(self.sentiment_against, 0.15))
        .min(1.0)
    }
}

/// Stateful exit classifier. One instance per symbol; the only state is the
/// per-ticket peak-P&L map.
pub struct ExitOracle {
    config: ExitConfig,
    detectors: Vec<Box<dyn ReversalDetector + Send + Sync>>,
    peaks: HashMap<Ticket, f64>,
}

impl std::fmt::Debug for ExitOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitOracle")
            .field("config", &self.config)
            .field("peaks", &self.peaks)
            .finish()
    }
}

impl ExitOracle {
    pub fn new(config: ExitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let detectors: Vec<Box<dyn ReversalDetector + Send + Sync>> = vec![
            Box::new(TrendFlip),
            Box::new(RsiExtreme::default()),
            Box::new(MacdCross),
            Box::new(BollingerBreach),
            Box::new(ProfitGiveback::default()),
            Box::new(VolumeClimax::default()),
        ];
        Ok(Self {
            config,
            detectors,
            peaks: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ExitConfig {
        &self.config
    }

    /// Evaluate every open position against the latest bars, most urgent
    /// decision first. Corrupted snapshots are skipped, never fatal.
    pub fn evaluate(
        &mut self,
        positions: &[PositionSnapshot],
        bars: &[Bar],
        advisory: &AdvisoryInputs,
    ) -> Vec<ExitDecision> {
        let snapshot = IndicatorSnapshot::from_bars(bars, &self.config.periods)
            .unwrap_or_else(|| empty_snapshot(bars));
        let boost = advisory.boost();

        let mut decisions: Vec<ExitDecision> = positions
            .iter()
            .filter(|p| p.is_valid())
            .map(|p| self.evaluate_one(p, &snapshot, boost, advisory))
            .collect();

        decisions.sort_by(|a, b| {
            b.urgency
                .cmp(&a.urgency)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
        });
        decisions
    }

    fn evaluate_one(
        &mut self,
        position: &PositionSnapshot,
        snapshot: &IndicatorSnapshot,
        boost: f64,
        advisory: &AdvisoryInputs,
    ) -> ExitDecision {
        let peak = self
            .peaks
            .entry(position.ticket)
            .and_modify(|p| *p = p.max(position.unrealized_pnl))
            .or_insert(position.unrealized_pnl);
        let peak = *peak;

        let ctx = ExitContext {
            position,
            snapshot,
            peak_pnl: peak,
        };

        let weights = self.config.weights.as_array();
        let enabled = self.config.toggles.as_array();
        let total_weight: f64 = weights.iter().sum();

        let mut contributing = Vec::new();
        let mut fired: Vec<(ReasonCode, f64)> = Vec::new();
        let mut weighted = 0.0;
        for (i, detector) in self.detectors.iter().enumerate() {
            if !enabled[i] {
                continue;
            }
            let signal = detector.evaluate(&ctx);
            if signal.signaling {
                weighted += weights[i] * signal.strength;
                fired.push((detector.code(), signal.strength));
                contributing.push(Reason::new(
                    detector.code(),
                    format!("{} strength {:.2}", detector.name(), signal.strength),
                ));
            }
        }

        let raw_confluence = if total_weight > f64::EPSILON {
            weighted / total_weight
        } else {
            0.0
        };
        let confluence = raw_confluence * (1.0 + boost * 0.3);
        if boost > 0.0 {
            contributing.push(Reason::new(
                ReasonCode::RegimeChange,
                format!("advisory boost {boost:.2}"),
            ));
        }

        let pnl_pct = position.pnl_pct();
        let factor = if pnl_pct < self.config.deep_loss_pct {
            0.8
        } else if pnl_pct >= self.config.min_profit_to_protect {
            0.9
        } else {
            1.0
        };
        let thresholds = self.config.thresholds.scaled(factor);

        let (urgency, close_fraction) = grade(confluence, &thresholds);
        let reason = attribute(&fired, pnl_pct, advisory, urgency, confluence);

        ExitDecision {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            urgency,
            close_fraction,
            confidence: confluence.min(1.0),
            reason,
            contributing,
        }
    }

    /// Clear the tracked peak when the position actually closes.
    pub fn position_closed(&mut self, ticket: Ticket) {
        self.peaks.remove(&ticket);
    }

    pub fn tracked_peak(&self, ticket: Ticket) -> Option<f64> {
        self.peaks.get(&ticket).copied()
    }
}

/// Snapshot used when the window cannot warm any indicator: every field NaN
/// except the closes, so only the P&L-based detector can fire.
fn empty_snapshot(bars: &[Bar]) -> IndicatorSnapshot {
    let close = bars.last().map_or(f64::NAN, |b| b.close);
    IndicatorSnapshot {
        close,
        prev_close: f64::NAN,
        ema_fast: f64::NAN,
        ema_slow: f64::NAN,
        prev_ema_fast: f64::NAN,
        prev_ema_slow: f64::NAN,
        rsi: f64::NAN,
        prev_rsi: f64::NAN,
        macd: f64::NAN,
        macd_signal: f64::NAN,
        prev_macd: f64::NAN,
        prev_macd_signal: f64::NAN,
        bb_upper: f64::NAN,
        bb_lower: f64::NAN,
        volume: f64::NAN,
        avg_volume: f64::NAN,
    }
}

/// Map boosted confluence onto an urgency tier and close fraction.
fn grade(confluence: f64, t: &ExitThresholds) -> (ExitUrgency, f64) {
    if confluence >= t.emergency {
        (ExitUrgency::Emergency, 1.0)
    } else if confluence >= t.close_now {
        let frac = (confluence - t.close_now) / (t.emergency - t.close_now);
        (ExitUrgency::CloseNow, 0.75 + 0.25 * frac)
    } else if confluence >= t.scale_out {
        let frac = (confluence - t.scale_out) / (t.close_now - t.scale_out);
        (ExitUrgency::ScaleOut, 0.25 + 0.25 * frac)
    } else {
        (ExitUrgency::Hold, 0.0)
    }
}

/// Fixed attribution priority: trend flip, then giveback while profitable,
/// then RSI/MACD, then regime boost, then generic confluence, then
/// time-based when nothing fired.
fn attribute(
    fired: &[(ReasonCode, f64)],
    pnl_pct: f64,
    advisory: &AdvisoryInputs,
    urgency: ExitUrgency,
    confluence: f64,
) -> Reason {
    let has = |code: ReasonCode| fired.iter().any(|(c, _)| *c == code);

    if has(ReasonCode::TrendFlip) {
        return Reason::new(ReasonCode::TrendFlip, "trend flipped against the position");
    }
    if has(ReasonCode::ProfitGiveback) && pnl_pct > 0.0 {
        return Reason::new(
            ReasonCode::ProfitGiveback,
            "giving back too much of the open profit",
        );
    }
    if has(ReasonCode::RsiExtreme) {
        return Reason::new(ReasonCode::RsiExtreme, "RSI exhausted and turning");
    }
    if has(ReasonCode::MacdCross) {
        return Reason::new(ReasonCode::MacdCross, "MACD crossed against the position");
    }
    if advisory.regime_change.unwrap_or(0.0) > 0.0 && urgency > ExitUrgency::Hold {
        return Reason::new(ReasonCode::RegimeChange, "market regime turned");
    }
    if !fired.is_empty() {
        return Reason::new(
            ReasonCode::ReversalConfluence,
            format!("reversal confluence {confluence:.2}"),
        );
    }
    Reason::new(ReasonCode::TimeBased, "no reversal signal on this bar")
}
