//! MACD: Moving Average Convergence/Divergence.
//!
//! Line: EMA(close, fast) - EMA(close, slow).
//! Signal: EMA(line, signal_period), seeded where the line becomes valid.

use crate::domain::Bar;
use crate::indicators::ema::{ema_of_bars, ema_series};

/// MACD line and signal series, same length as the input bars.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
}

pub fn macd_series(bars: &[Bar], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let n = bars.len();
    let fast_ema = ema_of_bars(bars, fast);
    let slow_ema = ema_of_bars(bars, slow);

    let mut line = vec![f64::NAN; n];
    for i in 0..n {
        if !fast_ema[i].is_nan() && !slow_ema[i].is_nan() {
            line[i] = fast_ema[i] - slow_ema[i];
        }
    }

    // Signal EMA runs on the valid suffix of the line.
    let valid_start = line.iter().position(|v| !v.is_nan());
    let mut signal_out = vec![f64::NAN; n];
    if let Some(start) = valid_start {
        let suffix = ema_series(&line[start..], signal);
        for (offset, v) in suffix.into_iter().enumerate() {
            signal_out[start + offset] = v;
        }
    }

    MacdSeries {
        line,
        signal: signal_out,
    }
}
