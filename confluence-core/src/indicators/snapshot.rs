//! Indicator snapshot: the last-bar indicator state the exit ensemble reads.
//!
//! Built once per evaluation from the bar window; detectors never recompute
//! series themselves. Fields may be NaN when the window is too short; each
//! detector NaN-guards what it reads.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::indicators::{bollinger_bands, ema_of_bars, macd_series, rsi_series};

/// Periods used when building a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPeriods {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger: usize,
    pub bollinger_mult: f64,
    pub volume_avg: usize,
}

impl Default for SnapshotPeriods {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_slow: 21,
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger: 20,
            bollinger_mult: 2.0,
            volume_avg: 20,
        }
    }
}

/// Flattened view of the indicators at the latest bar (plus the previous bar
/// where crossover detection needs it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub prev_close: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub prev_ema_fast: f64,
    pub prev_ema_slow: f64,
    pub rsi: f64,
    pub prev_rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub prev_macd: f64,
    pub prev_macd_signal: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub volume: f64,
    pub avg_volume: f64,
}

impl IndicatorSnapshot {
    /// Build the snapshot from the bar window. Needs at least two bars;
    /// individual fields degrade to NaN when their series has not warmed up.
    pub fn from_bars(bars: &[Bar], periods: &SnapshotPeriods) -> Option<Self> {
        if bars.len() < 2 {
            return None;
        }
        let last = bars.len() - 1;
        let prev = last - 1;

        let fast = ema_of_bars(bars, periods.ema_fast);
        let slow = ema_of_bars(bars, periods.ema_slow);
        let rsi = rsi_series(bars, periods.rsi);
        let macd = macd_series(bars, periods.macd_fast, periods.macd_slow, periods.macd_signal);
        let bands = bollinger_bands(bars, periods.bollinger, periods.bollinger_mult);

        let avg_volume = {
            let count = periods.volume_avg.min(last); // exclude the last bar
            if count == 0 {
                f64::NAN
            } else {
                bars[last - count..last].iter().map(|b| b.volume).sum::<f64>() / count as f64
            }
        };

        Some(Self {
            close: bars[last].close,
            prev_close: bars[prev].close,
            ema_fast: fast[last],
            ema_slow: slow[last],
            prev_ema_fast: fast[prev],
            prev_ema_slow: slow[prev],
            rsi: rsi[last],
            prev_rsi: rsi[prev],
            macd: macd.line[last],
            macd_signal: macd.signal[last],
            prev_macd: macd.line[prev],
            prev_macd_signal: macd.signal[prev],
            bb_upper: bands.upper[last],
            bb_lower: bands.lower[last],
            volume: bars[last].volume,
            avg_volume,
        })
    }
}
