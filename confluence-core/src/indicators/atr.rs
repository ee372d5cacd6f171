//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! The caller normally supplies ATR as a scalar; `atr_or_fallback` derives it
//! from the bar window when it does not.

use crate::domain::Bar;

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    if n == 0 {
        return tr;
    }

    let h = bars[0].high;
    let l = bars[0].low;
    if h.is_nan() || l.is_nan() {
        tr[0] = f64::NAN;
    } else {
        tr[0] = h - l;
    }

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if h.is_nan() || l.is_nan() || pc.is_nan() {
            tr[i] = f64::NAN;
        } else {
            tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
        }
    }

    tr
}

/// Apply Wilder smoothing to a series. Alpha = 1/period.
/// Seed: mean of the first `period` consecutive non-NaN values.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if n < period || period == 0 {
        return result;
    }

    // Find the first index with `period` consecutive non-NaN values.
    let seed_start = (0..n).find(|&i| {
        i + period <= n && values[i..i + period].iter().all(|v| !v.is_nan())
    });

    let seed_start = match seed_start {
        Some(s) => s,
        None => return result,
    };

    let seed_end = seed_start + period;
    let seed: f64 = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;

    for i in seed_end..n {
        if values[i].is_nan() {
            // NaN taints everything after it.
            for val in result.iter_mut().skip(i) {
                *val = f64::NAN;
            }
            return result;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}

/// Wilder-smoothed ATR series.
///
/// TR[0] has no previous close, so it is excluded from the seed window.
pub fn atr_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut tr = true_range(bars);
    if !tr.is_empty() {
        tr[0] = f64::NAN;
    }
    wilder_smooth(&tr, period)
}

/// Resolve the working ATR: prefer the caller-supplied scalar, otherwise
/// average the last `period` true ranges of the window.
///
/// Returns `None` when neither source yields a positive finite value;
/// callers treat that as insufficient data, never as an error.
pub fn atr_or_fallback(supplied: Option<f64>, bars: &[Bar], period: usize) -> Option<f64> {
    if let Some(atr) = supplied {
        if atr.is_finite() && atr > 0.0 {
            return Some(atr);
        }
    }

    if bars.len() < period + 1 {
        return None;
    }

    let tr = true_range(bars);
    let tail = &tr[tr.len() - period..];
    if tail.iter().any(|v| v.is_nan()) {
        return None;
    }
    let avg = tail.iter().sum::<f64>() / period as f64;
    if avg > 0.0 {
        Some(avg)
    } else {
        None
    }
}
