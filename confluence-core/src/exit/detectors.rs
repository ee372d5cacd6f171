//! Exit reversal detectors: six independent reads of "this position's move
//! is ending", combined by the oracle.
//!
//! Each detector is pure: it looks at the position, the indicator snapshot,
//! and the tracked peak P&L, and returns whether it is signaling plus a
//! strength in [0,1]. NaN indicator fields read as not-signaling.

use crate::domain::{PositionSnapshot, ReasonCode, TradeDirection};
use crate::indicators::IndicatorSnapshot;

const EPSILON: f64 = 1e-10;

/// Everything a detector may read for one position.
#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    pub position: &'a PositionSnapshot,
    pub snapshot: &'a IndicatorSnapshot,
    /// Highest unrealized P&L seen for this ticket so far.
    pub peak_pnl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReversalSignal {
    pub signaling: bool,
    pub strength: f64,
}

impl ReversalSignal {
    pub const QUIET: Self = Self {
        signaling: false,
        strength: 0.0,
    };

    fn firing(strength: f64) -> Self {
        Self {
            signaling: true,
            strength: strength.clamp(0.0, 1.0),
        }
    }
}

/// One reversal read. Implementations are stateless.
pub trait ReversalDetector {
    fn name(&self) -> &'static str;
    /// Attribution tag for decisions this detector drives.
    fn code(&self) -> ReasonCode;
    fn evaluate(&self, ctx: &ExitContext<'_>) -> ReversalSignal;
}

fn any_nan(values: &[f64]) -> bool {
    values.iter().any(|v| v.is_nan())
}

// ─── Trend flip ───

/// Fast/slow EMA on the wrong side of each other for the position. A fresh
/// cross reads stronger than a persisting one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendFlip;

impl ReversalDetector for TrendFlip {
    fn name(&self) -> &'static str {
        "trend_flip"
    }

    fn code(&self) -> ReasonCode {
        ReasonCode::TrendFlip
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ReversalSignal {
        let s = ctx.snapshot;
        if any_nan(&[s.ema_fast, s.ema_slow, s.prev_ema_fast, s.prev_ema_slow]) {
            return ReversalSignal::QUIET;
        }
        let sign = ctx.position.direction.sign();
        let adverse = (s.ema_fast - s.ema_slow) * sign < 0.0;
        if !adverse {
            return ReversalSignal::QUIET;
        }
        let fresh = (s.prev_ema_fast - s.prev_ema_slow) * sign >= 0.0;
        ReversalSignal::firing(if fresh { 0.9 } else { 0.6 })
    }
}

// ─── RSI extreme ───

/// RSI in exhaustion territory for the position and already turning.
#[derive(Debug, Clone, Copy)]
pub struct RsiExtreme {
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiExtreme {
    fn default() -> Self {
        Self {
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl ReversalDetector for RsiExtreme {
    fn name(&self) -> &'static str {
        "rsi_extreme"
    }

    fn code(&self) -> ReasonCode {
        ReasonCode::RsiExtreme
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ReversalSignal {
        let s = ctx.snapshot;
        if any_nan(&[s.rsi, s.prev_rsi]) {
            return ReversalSignal::QUIET;
        }
        match ctx.position.direction {
            TradeDirection::Long if s.rsi > self.overbought && s.rsi < s.prev_rsi => {
                let depth = (s.rsi - self.overbought) / (100.0 - self.overbought);
                ReversalSignal::firing(0.5 + 0.5 * depth)
            }
            TradeDirection::Short if s.rsi < self.oversold && s.rsi > s.prev_rsi => {
                let depth = (self.oversold - s.rsi) / self.oversold;
                ReversalSignal::firing(0.5 + 0.5 * depth)
            }
            _ => ReversalSignal::QUIET,
        }
    }
}

// ─── MACD cross ───

/// MACD line crossing its signal line against the position on this bar.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacdCross;

impl ReversalDetector for MacdCross {
    fn name(&self) -> &'static str {
        "macd_cross"
    }

    fn code(&self) -> ReasonCode {
        ReasonCode::MacdCross
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ReversalSignal {
        let s = ctx.snapshot;
        if any_nan(&[s.macd, s.macd_signal, s.prev_macd, s.prev_macd_signal]) {
            return ReversalSignal::QUIET;
        }
        let sign = ctx.position.direction.sign();
        let was_with = (s.prev_macd - s.prev_macd_signal) * sign >= 0.0;
        let now_against = (s.macd - s.macd_signal) * sign < 0.0;
        if was_with && now_against {
            ReversalSignal::firing(0.7)
        } else {
            ReversalSignal::QUIET
        }
    }
}

// ─── Bollinger breach ───

/// Close breaching the adverse band: lower band for longs, upper for shorts.
#[derive(Debug, Clone, Copy, Default)]
pub struct BollingerBreach;

impl ReversalDetector for BollingerBreach {
    fn name(&self) -> &'static str {
        "bollinger_breach"
    }

    fn code(&self) -> ReasonCode {
        ReasonCode::BollingerBreach
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ReversalSignal {
        let s = ctx.snapshot;
        if any_nan(&[s.close, s.bb_upper, s.bb_lower]) {
            return ReversalSignal::QUIET;
        }
        let width = (s.bb_upper - s.bb_lower).max(EPSILON);
        let penetration = match ctx.position.direction {
            TradeDirection::Long => (s.bb_lower - s.close) / width,
            TradeDirection::Short => (s.close - s.bb_upper) / width,
        };
        if penetration > 0.0 {
            ReversalSignal::firing(0.6 + 2.0 * penetration)
        } else {
            ReversalSignal::QUIET
        }
    }
}

// ─── Profit giveback ───

/// Position has surrendered at least `threshold` of its peak unrealized P&L.
/// Strength grows from 0 at the threshold to 1 at a full round trip.
#[derive(Debug, Clone, Copy)]
pub struct ProfitGiveback {
    pub threshold: f64,
}

impl Default for ProfitGiveback {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl ReversalDetector for ProfitGiveback {
    fn name(&self) -> &'static str {
        "profit_giveback"
    }

    fn code(&self) -> ReasonCode {
        ReasonCode::ProfitGiveback
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ReversalSignal {
        if ctx.peak_pnl <= EPSILON {
            return ReversalSignal::QUIET;
        }
        let giveback = (ctx.peak_pnl - ctx.position.unrealized_pnl) / ctx.peak_pnl;
        if giveback < self.threshold {
            return ReversalSignal::QUIET;
        }
        let span = (1.0 - self.threshold).max(EPSILON);
        ReversalSignal::firing((giveback - self.threshold) / span)
    }
}

// ─── Volume climax ───

/// Adverse move on at least `ratio` times average volume.
#[derive(Debug, Clone, Copy)]
pub struct VolumeClimax {
    pub ratio: f64,
}

impl Default for VolumeClimax {
    fn default() -> Self {
        Self { ratio: 2.0 }
    }
}

impl ReversalDetector for VolumeClimax {
    fn name(&self) -> &'static str {
        "volume_climax"
    }

    fn code(&self) -> ReasonCode {
        ReasonCode::VolumeClimax
    }

    fn evaluate(&self, ctx: &ExitContext<'_>) -> ReversalSignal {
        let s = ctx.snapshot;
        if any_nan(&[s.close, s.prev_close, s.volume, s.avg_volume]) || s.avg_volume < EPSILON {
            return ReversalSignal::QUIET;
        }
        let adverse = (s.close - s.prev_close) * ctx.position.direction.sign() < 0.0;
        let surge = s.volume / s.avg_volume;
        if adverse && surge >= self.ratio {
            // 0.5 at the ratio floor, 1.0 at twice the floor.
            ReversalSignal::firing(0.5 + 0.5 * (surge - self.ratio) / self.ratio)
        } else {
            ReversalSignal::QUIET
        }
    }
}
