//! Structure break classification: BOS (break of structure) and ChoCH
//! (change of character).
//!
//! A break fires when the newest close lands beyond the latest swing level by
//! at least `min_move_atr * atr`: above the level is a bullish break, below
//! is bearish. BOS if the break continues the classifier's `current_trend`,
//! ChoCH if it reverses it. The trend flips unconditionally on every
//! qualifying break: no hysteresis. In choppy markets this can flip-flop
//! rapidly; kept as-is, a damping rule is a future refinement.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, TradeDirection};
use crate::structure::swing::detect_swing_points;

/// Prevailing structural trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    #[default]
    None,
}

/// Kind of structure break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BreakKind {
    /// Continues the prevailing trend.
    Bos,
    /// Reverses the prevailing trend.
    Choch,
}

/// A detected structure break.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub kind: BreakKind,
    pub direction: TradeDirection,
    /// Index of the breaking bar within the window that produced it.
    pub bar_index: usize,
    /// The swing level that was broken.
    pub level: f64,
}

/// Stateful BOS/ChoCH classifier.
///
/// Owns `current_trend`; the same swing level is never signaled twice in the
/// same direction, so one break yields one event even when the classifier
/// runs on every bar of a sliding window.
#[derive(Debug, Clone)]
pub struct StructureBreakClassifier {
    swing_lookback: usize,
    min_move_atr: f64,
    current_trend: Trend,
    last_signaled: Option<(f64, TradeDirection)>,
}

impl StructureBreakClassifier {
    pub fn new(swing_lookback: usize, min_move_atr: f64) -> Self {
        Self {
            swing_lookback,
            min_move_atr,
            current_trend: Trend::None,
            last_signaled: None,
        }
    }

    pub fn current_trend(&self) -> Trend {
        self.current_trend
    }

    /// Classify the newest close against the latest swing level.
    ///
    /// Returns `None` when the window is too short, no swing exists yet, or
    /// the close does not clear the level by the threshold. With no prior
    /// trend, the first qualifying break is classified BOS.
    pub fn classify(&mut self, bars: &[Bar], atr: f64) -> Option<StructureBreak> {
        if bars.is_empty() || !atr.is_finite() || atr <= 0.0 {
            return None;
        }
        let last = bars.len() - 1;
        let close = bars[last].close;
        if close.is_nan() {
            return None;
        }

        let points = detect_swing_points(bars, self.swing_lookback);
        let swing = points.last()?;
        let level = swing.price;
        let threshold = self.min_move_atr * atr;

        let direction = if close - level >= threshold {
            TradeDirection::Long
        } else if level - close >= threshold {
            TradeDirection::Short
        } else {
            return None;
        };

        if self.last_signaled == Some((level, direction)) {
            return None;
        }

        let new_trend = match direction {
            TradeDirection::Long => Trend::Bullish,
            TradeDirection::Short => Trend::Bearish,
        };
        let kind = match (self.current_trend, new_trend) {
            (Trend::Bullish, Trend::Bearish) | (Trend::Bearish, Trend::Bullish) => BreakKind::Choch,
            _ => BreakKind::Bos,
        };

        self.current_trend = new_trend;
        self.last_signaled = Some((level, direction));

        Some(StructureBreak {
            kind,
            direction,
            bar_index: last,
            level,
        })
    }
}
