//! ADX: Average Directional Index (Wilder).
//!
//! 1. +DM / -DM from consecutive bars
//! 2. Wilder-smooth +DM, -DM, TR
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR), same for -DI
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! Warmup: roughly 2 * period bars.

use crate::domain::Bar;
use crate::indicators::atr::{true_range, wilder_smooth};

/// ADX series. Values in [0, 100], NaN during warmup.
pub fn adx_series(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let result = vec![f64::NAN; n];

    if n < 2 || period == 0 {
        return result;
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        if bars[i].high.is_nan()
            || bars[i].low.is_nan()
            || bars[i - 1].high.is_nan()
            || bars[i - 1].low.is_nan()
        {
            continue;
        }

        let high_diff = bars[i].high - bars[i - 1].high;
        let low_diff = bars[i - 1].low - bars[i].low;

        plus_dm[i] = if high_diff > low_diff && high_diff > 0.0 {
            high_diff
        } else {
            0.0
        };
        minus_dm[i] = if low_diff > high_diff && low_diff > 0.0 {
            low_diff
        } else {
            0.0
        };
    }

    let tr = true_range(bars);
    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if smooth_tr[i].is_nan()
            || smooth_plus[i].is_nan()
            || smooth_minus[i].is_nan()
            || smooth_tr[i] < f64::EPSILON
        {
            continue;
        }

        let plus_di = 100.0 * smooth_plus[i] / smooth_tr[i];
        let minus_di = 100.0 * smooth_minus[i] / smooth_tr[i];
        let di_sum = plus_di + minus_di;

        dx[i] = if di_sum < f64::EPSILON {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
    }

    wilder_smooth(&dx, period)
}

/// Latest ADX value, or None when the window is too short for warmup.
pub fn latest_adx(bars: &[Bar], period: usize) -> Option<f64> {
    let series = adx_series(bars, period);
    series.last().copied().filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn adx_bounds() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bars = make_bars(&closes);
        let result = adx_series(&bars, 5);
        for &v in &result {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "ADX out of bounds: {v}");
            }
        }
        assert!(!result.last().unwrap().is_nan());
    }

    #[test]
    fn adx_strong_trend_is_high() {
        // Steady uptrend: +DM dominates, ADX should end well above 25.
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 2.0).collect();
        let bars = make_bars(&closes);
        let adx = latest_adx(&bars, 5).unwrap();
        assert!(adx > 25.0, "trending ADX too low: {adx}");
    }

    #[test]
    fn adx_short_window_none() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        assert!(latest_adx(&bars, 14).is_none());
    }
}
