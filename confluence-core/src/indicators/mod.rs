//! Indicator series: pure functions over bar history.
//!
//! All series functions return a `Vec<f64>` the same length as the input,
//! with `f64::NAN` during warmup. No indicator value at bar t may depend on
//! price data from bar t+1 or later.
//!
//! The exit ensemble consumes a flattened one-bar [`IndicatorSnapshot`]
//! rather than full series.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod snapshot;

pub use adx::adx_series;
pub use atr::{atr_or_fallback, atr_series, true_range, wilder_smooth};
pub use bollinger::{bollinger_bands, BollingerSeries};
pub use ema::{ema_of_bars, ema_series, sma_series};
pub use macd::{macd_series, MacdSeries};
pub use rsi::rsi_series;
pub use snapshot::IndicatorSnapshot;

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
/// Timestamps are one minute apart starting at 2024-01-02 08:00 UTC.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                symbol: "TEST".to_string(),
                timestamp: base + chrono::Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
