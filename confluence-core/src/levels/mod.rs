//! Price level registry: a pure snapshot of the levels near current price.
//!
//! `build_levels` is recomputed fresh on every call and holds no state:
//! swing-cluster support/resistance, round numbers, previous-session
//! high/low, EMA levels, and order-block midpoints, each with a strength in
//! [0,1] and a touch count.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::indicators::ema_of_bars;
use crate::structure::{detect_swing_points, OrderBlockDetector};

const EPSILON: f64 = 1e-10;

/// What a price level represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Support,
    Resistance,
    RoundNumber,
    PrevSessionHigh,
    PrevSessionLow,
    Ema,
    OrderBlock,
}

/// One derived price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub kind: LevelKind,
    pub strength: f64,
    pub touches: u32,
}

/// Knobs for level derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Fractal lookback for swing clustering.
    pub swing_lookback: usize,
    /// Swing touches required before a cluster becomes a level.
    pub min_touches: u32,
    /// Cluster tolerance = atr * tolerance_factor.
    pub tolerance_factor: f64,
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            swing_lookback: 5,
            min_touches: 2,
            tolerance_factor: 0.5,
            ema_fast_period: 20,
            ema_slow_period: 50,
        }
    }
}

/// Derive every level near the latest close. Returns an empty vec when the
/// window is too short or the ATR is unusable (insufficient data, not an
/// error).
pub fn build_levels(
    bars: &[Bar],
    atr: f64,
    blocks: &OrderBlockDetector,
    config: &LevelConfig,
) -> Vec<PriceLevel> {
    let Some(last) = bars.last() else {
        return Vec::new();
    };
    if last.close.is_nan() || !atr.is_finite() || atr <= 0.0 {
        return Vec::new();
    }
    let price = last.close;
    let tolerance = (atr * config.tolerance_factor).max(EPSILON);

    let mut levels = Vec::new();
    swing_cluster_levels(bars, price, tolerance, config, &mut levels);
    round_number_levels(price, atr, &mut levels);
    prev_session_levels(bars, last, &mut levels);
    ema_levels(bars, config, &mut levels);

    for block in blocks.active_blocks() {
        levels.push(PriceLevel {
            price: block.midpoint(),
            kind: LevelKind::OrderBlock,
            // Fresh zones carry more weight than tested ones.
            strength: (0.8 - 0.1 * block.touches as f64).clamp(0.3, 0.8),
            touches: block.touches,
        });
    }

    levels
}

/// Cluster swing highs/lows within `tolerance`; clusters with enough touches
/// become resistance (above price) or support (below).
fn swing_cluster_levels(
    bars: &[Bar],
    price: f64,
    tolerance: f64,
    config: &LevelConfig,
    out: &mut Vec<PriceLevel>,
) {
    let points = detect_swing_points(bars, config.swing_lookback);
    let mut clusters: Vec<(f64, u32)> = Vec::new(); // (mean price, touches)

    for point in &points {
        match clusters
            .iter_mut()
            .find(|(mean, _)| (*mean - point.price).abs() <= tolerance)
        {
            Some((mean, touches)) => {
                // Running mean keeps the cluster centered.
                *mean = (*mean * *touches as f64 + point.price) / (*touches + 1) as f64;
                *touches += 1;
            }
            None => clusters.push((point.price, 1)),
        }
    }

    for (mean, touches) in clusters {
        if touches < config.min_touches {
            continue;
        }
        let kind = if mean >= price {
            LevelKind::Resistance
        } else {
            LevelKind::Support
        };
        // Each extra touch past the minimum adds 0.15, saturating at 1.0.
        let strength = (0.5 + 0.15 * (touches - config.min_touches) as f64).min(1.0);
        out.push(PriceLevel {
            price: mean,
            kind,
            strength,
            touches,
        });
    }
}

/// Step for the magnitude band the price sits in.
fn round_step(price: f64) -> f64 {
    if price >= 10_000.0 {
        1000.0
    } else if price >= 1_000.0 {
        100.0
    } else if price >= 100.0 {
        10.0
    } else {
        1.0
    }
}

fn round_number_levels(price: f64, atr: f64, out: &mut Vec<PriceLevel>) {
    let step = round_step(price);
    let base = (price / step).floor() * step;
    for candidate in [base, base + step] {
        if (candidate - price).abs() <= 3.0 * atr {
            out.push(PriceLevel {
                price: candidate,
                kind: LevelKind::RoundNumber,
                strength: 0.5,
                touches: 0,
            });
        }
    }
}

fn prev_session_levels(bars: &[Bar], last: &Bar, out: &mut Vec<PriceLevel>) {
    let today = last.timestamp.date_naive();
    let prev: Vec<&Bar> = bars
        .iter()
        .filter(|b| b.timestamp.date_naive() < today)
        .collect();
    if prev.is_empty() {
        return;
    }
    let prev_date = prev
        .iter()
        .map(|b| b.timestamp.date_naive())
        .max()
        .unwrap_or(today);
    let (mut high, mut low) = (f64::NEG_INFINITY, f64::INFINITY);
    for b in prev.iter().filter(|b| b.timestamp.date_naive() == prev_date) {
        if b.high.is_nan() || b.low.is_nan() {
            continue;
        }
        high = high.max(b.high);
        low = low.min(b.low);
    }
    if high.is_finite() && low.is_finite() {
        out.push(PriceLevel {
            price: high,
            kind: LevelKind::PrevSessionHigh,
            strength: 0.7,
            touches: 0,
        });
        out.push(PriceLevel {
            price: low,
            kind: LevelKind::PrevSessionLow,
            strength: 0.7,
            touches: 0,
        });
    }
}

fn ema_levels(bars: &[Bar], config: &LevelConfig, out: &mut Vec<PriceLevel>) {
    for (period, strength) in [
        (config.ema_fast_period, 0.5),
        (config.ema_slow_period, 0.6),
    ] {
        let series = ema_of_bars(bars, period);
        if let Some(&value) = series.last() {
            if !value.is_nan() {
                out.push(PriceLevel {
                    price: value,
                    kind: LevelKind::Ema,
                    strength,
                    touches: 0,
                });
            }
        }
    }
}

/// Proximity sub-score in [0,1]: how close `price` sits to the nearest
/// level, weighted by that level's strength. Falls to 0 two ATRs away;
/// neutral 0.5 when no levels exist. Monotone non-decreasing as price
/// approaches the nearest level.
pub fn proximity_score(levels: &[PriceLevel], price: f64, atr: f64) -> f64 {
    if atr < EPSILON {
        return 0.5;
    }
    match nearest_level(levels, price) {
        Some(level) => {
            let proximity = (1.0 - (level.price - price).abs() / (2.0 * atr)).clamp(0.0, 1.0);
            proximity * (0.5 + 0.5 * level.strength.clamp(0.0, 1.0))
        }
        None => 0.5,
    }
}

/// Level closest to `price`, by absolute distance.
pub fn nearest_level<'a>(levels: &'a [PriceLevel], price: f64) -> Option<&'a PriceLevel> {
    levels.iter().min_by(|a, b| {
        let da = (a.price - price).abs();
        let db = (b.price - price).abs();
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::OrderBlockConfig;
    use chrono::TimeZone;

    fn detector() -> OrderBlockDetector {
        OrderBlockDetector::new(OrderBlockConfig::default())
    }

    fn bars_with_double_top() -> Vec<Bar> {
        // Two swing highs near 110 (within tolerance), one swing low at 94.
        let data: &[(f64, f64, f64, f64)] = &[
            (100.0, 101.0, 99.0, 100.5),
            (100.5, 105.0, 100.0, 104.0),
            (104.0, 110.0, 103.5, 109.0), // swing high 110.0
            (109.0, 109.5, 102.5, 103.0),
            (103.0, 103.5, 97.5, 98.0),
            (98.0, 98.5, 94.0, 95.0), // swing low 94.0
            (95.0, 99.5, 94.5, 99.0),
            (99.0, 110.3, 98.5, 109.5), // swing high 110.3
            (109.5, 109.8, 104.0, 105.0),
            (105.0, 105.5, 101.0, 102.0),
        ];
        let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                symbol: "TEST".to_string(),
                timestamp: base + chrono::Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn empty_on_no_bars_or_bad_atr() {
        let config = LevelConfig::default();
        assert!(build_levels(&[], 1.0, &detector(), &config).is_empty());
        let bars = bars_with_double_top();
        assert!(build_levels(&bars, 0.0, &detector(), &config).is_empty());
        assert!(build_levels(&bars, f64::NAN, &detector(), &config).is_empty());
    }

    #[test]
    fn double_top_clusters_into_resistance() {
        let config = LevelConfig {
            swing_lookback: 2,
            min_touches: 2,
            tolerance_factor: 0.5,
            ..LevelConfig::default()
        };
        // ATR 1.0 → tolerance 0.5; 110.0 and 110.3 cluster together.
        let levels = build_levels(&bars_with_double_top(), 1.0, &detector(), &config);
        let res: Vec<_> = levels
            .iter()
            .filter(|l| l.kind == LevelKind::Resistance)
            .collect();
        assert_eq!(res.len(), 1);
        assert!((res[0].price - 110.15).abs() < 1e-9);
        assert_eq!(res[0].touches, 2);

        // The lone swing low at 94 misses min_touches.
        assert!(levels.iter().all(|l| l.kind != LevelKind::Support));
    }

    #[test]
    fn round_numbers_by_magnitude_band() {
        assert_eq!(round_step(25_000.0), 1000.0);
        assert_eq!(round_step(2_500.0), 100.0);
        assert_eq!(round_step(250.0), 10.0);
        assert_eq!(round_step(25.0), 1.0);

        let mut out = Vec::new();
        round_number_levels(102.0, 1.0, &mut out);
        // Step 10: 100 within 3x ATR, 110 not.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].price, 100.0);
        assert_eq!(out[0].kind, LevelKind::RoundNumber);
    }

    #[test]
    fn previous_day_high_low() {
        let mut bars = bars_with_double_top();
        // Move the last two bars to the next day.
        let next = chrono::Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap();
        let n = bars.len();
        bars[n - 2].timestamp = next;
        bars[n - 1].timestamp = next + chrono::Duration::minutes(1);

        let levels = build_levels(&bars, 1.0, &detector(), &LevelConfig::default());
        let high = levels
            .iter()
            .find(|l| l.kind == LevelKind::PrevSessionHigh)
            .unwrap();
        let low = levels
            .iter()
            .find(|l| l.kind == LevelKind::PrevSessionLow)
            .unwrap();
        assert_eq!(high.price, 110.3);
        assert_eq!(low.price, 94.0);
    }

    #[test]
    fn nearest_level_by_distance() {
        let levels = vec![
            PriceLevel {
                price: 100.0,
                kind: LevelKind::Support,
                strength: 0.5,
                touches: 2,
            },
            PriceLevel {
                price: 110.0,
                kind: LevelKind::Resistance,
                strength: 0.5,
                touches: 2,
            },
        ];
        assert_eq!(nearest_level(&levels, 103.0).unwrap().price, 100.0);
        assert_eq!(nearest_level(&levels, 107.0).unwrap().price, 110.0);
        assert!(nearest_level(&[], 100.0).is_none());
    }
}
