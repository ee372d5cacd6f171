//! Fractal swing-point detector.
//!
//! Bar i is a swing high iff its high strictly exceeds the highs of
//! `lookback` bars on each side (symmetric rule for swing lows). The last
//! `lookback` bars can never confirm a swing: the right side is incomplete.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// A confirmed local extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    /// Index into the bar window the detector was given.
    pub bar_index: usize,
    pub price: f64,
    pub is_high: bool,
}

/// Detect all swing points in the window. Needs at least `2 * lookback + 1`
/// bars; shorter windows return an empty vec (insufficient data, not an error).
pub fn detect_swing_points(bars: &[Bar], lookback: usize) -> Vec<SwingPoint> {
    let n = bars.len();
    if lookback == 0 || n < 2 * lookback + 1 {
        return Vec::new();
    }

    let mut points = Vec::new();
    for i in lookback..(n - lookback) {
        let high = bars[i].high;
        let low = bars[i].low;
        if high.is_nan() || low.is_nan() {
            continue;
        }

        let neighbors = bars[i - lookback..i].iter().chain(&bars[i + 1..=i + lookback]);
        let mut is_swing_high = true;
        let mut is_swing_low = true;
        for b in neighbors {
            if b.high.is_nan() || b.low.is_nan() {
                is_swing_high = false;
                is_swing_low = false;
                break;
            }
            if b.high >= high {
                is_swing_high = false;
            }
            if b.low <= low {
                is_swing_low = false;
            }
        }

        if is_swing_high {
            points.push(SwingPoint {
                bar_index: i,
                price: high,
                is_high: true,
            });
        }
        if is_swing_low {
            points.push(SwingPoint {
                bar_index: i,
                price: low,
                is_high: false,
            });
        }
    }

    points
}

/// Most recent confirmed swing high.
pub fn last_swing_high(points: &[SwingPoint]) -> Option<SwingPoint> {
    points.iter().rev().find(|p| p.is_high).copied()
}

/// Most recent confirmed swing low.
pub fn last_swing_low(points: &[SwingPoint]) -> Option<SwingPoint> {
    points.iter().rev().find(|p| !p.is_high).copied()
}
