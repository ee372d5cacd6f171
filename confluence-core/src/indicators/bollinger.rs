//! Bollinger Bands: SMA(close, period) +/- multiplier * population stddev.

use crate::domain::Bar;

/// Upper/middle/lower band series, same length as the input bars.
#[derive(Debug, Clone)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(bars: &[Bar], period: usize, multiplier: f64) -> BollingerSeries {
    let n = bars.len();
    let mut upper = vec![f64::NAN; n];
    let mut middle = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    if period == 0 || n < period {
        return BollingerSeries { upper, middle, lower };
    }

    for i in (period - 1)..n {
        let window = &bars[i + 1 - period..=i];
        if window.iter().any(|b| b.close.is_nan()) {
            continue;
        }

        let mean = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|b| {
                let d = b.close - mean;
                d * d
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        middle[i] = mean;
        upper[i] = mean + multiplier * stddev;
        lower[i] = mean - multiplier * stddev;
    }

    BollingerSeries { upper, middle, lower }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn flat_series_bands_collapse() {
        let bars = make_bars(&[100.0; 10]);
        let bands = bollinger_bands(&bars, 5, 2.0);
        assert_approx(bands.upper[9], 100.0, DEFAULT_EPSILON);
        assert_approx(bands.middle[9], 100.0, DEFAULT_EPSILON);
        assert_approx(bands.lower[9], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bands_bracket_middle() {
        let bars = make_bars(&[100.0, 102.0, 98.0, 104.0, 96.0, 103.0, 99.0]);
        let bands = bollinger_bands(&bars, 5, 2.0);
        let i = 6;
        assert!(bands.upper[i] > bands.middle[i]);
        assert!(bands.lower[i] < bands.middle[i]);
    }

    #[test]
    fn warmup_is_nan() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let bands = bollinger_bands(&bars, 5, 2.0);
        assert!(bands.upper[3].is_nan());
        assert!(!bands.upper[4].is_nan());
    }

    #[test]
    fn known_values_period_2() {
        // Window [100, 102]: mean 101, pop stddev 1 → upper 103, lower 99.
        let bars = make_bars(&[100.0, 102.0]);
        let bands = bollinger_bands(&bars, 2, 2.0);
        assert_approx(bands.middle[1], 101.0, DEFAULT_EPSILON);
        assert_approx(bands.upper[1], 103.0, DEFAULT_EPSILON);
        assert_approx(bands.lower[1], 99.0, DEFAULT_EPSILON);
    }
}
