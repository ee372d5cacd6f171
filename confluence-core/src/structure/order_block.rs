//! Order block detection: institutional supply/demand zones.
//!
//! On a structure break, the last candle opposing the break direction (the
//! last bearish candle before a bullish break, and vice versa) defines a
//! zone. Zones accumulate touches, are mitigated when price closes fully
//! through them against their bias, and age out after `max_age_bars`.
//!
//! The detector owns the active-block set and an embedded
//! `StructureBreakClassifier`; one instance per symbol, driven one bar at a
//! time by `update`.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, TradeDirection};
use crate::structure::breaks::{BreakKind, StructureBreak, StructureBreakClassifier};

/// Configuration for order-block detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlockConfig {
    /// Fractal lookback for the embedded structure-break classifier.
    pub swing_lookback: usize,
    /// Minimum close-beyond-level distance, in ATR multiples.
    pub min_move_atr: f64,
    /// How far back to scan for the opposing candle after a break.
    pub scan_back_bars: usize,
    /// Zone = full candle range instead of the body.
    pub use_full_range: bool,
    /// Blocks older than this many update ticks are pruned.
    pub max_age_bars: u64,
}

impl Default for OrderBlockConfig {
    fn default() -> Self {
        Self {
            swing_lookback: 5,
            min_move_atr: 1.0,
            scan_back_bars: 10,
            use_full_range: false,
            max_age_bars: 300,
        }
    }
}

/// An active or mitigated order block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub zone_high: f64,
    pub zone_low: f64,
    /// The direction this zone supports (bullish block = demand zone).
    pub bias: TradeDirection,
    /// Kind of structure break that created the block.
    pub break_kind: BreakKind,
    pub touches: u32,
    pub is_mitigated: bool,
    /// Detector tick at which the block was created.
    created_tick: u64,
}

impl OrderBlock {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.zone_low && price <= self.zone_high
    }

    pub fn midpoint(&self) -> f64 {
        (self.zone_high + self.zone_low) / 2.0
    }

    /// Age in update ticks (bars seen since creation).
    pub fn age(&self, current_tick: u64) -> u64 {
        current_tick.saturating_sub(self.created_tick)
    }
}

/// Same-bar touch signal: price sits inside a lightly-tested block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTouchSignal {
    pub direction: TradeDirection,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub confidence: f64,
}

/// Stateful order-block detector. One instance per symbol.
#[derive(Debug, Clone)]
pub struct OrderBlockDetector {
    config: OrderBlockConfig,
    classifier: StructureBreakClassifier,
    blocks: Vec<OrderBlock>,
    last_break: Option<StructureBreak>,
    /// Monotonic bar counter, independent of window indices (the caller may
    /// pass a sliding window, so window indices cannot track age).
    tick: u64,
}

impl OrderBlockDetector {
    pub fn new(config: OrderBlockConfig) -> Self {
        let classifier = StructureBreakClassifier::new(config.swing_lookback, config.min_move_atr);
        Self {
            config,
            classifier,
            blocks: Vec::new(),
            last_break: None,
            tick: 0,
        }
    }

    /// Advance one bar: prune, detect a new break/block, update touches and
    /// mitigation against the newest close.
    pub fn update(&mut self, bars: &[Bar], atr: f64) {
        self.tick += 1;
        let tick = self.tick;

        // Prune blocks mitigated on an earlier bar or past max age.
        let max_age = self.config.max_age_bars;
        self.blocks
            .retain(|b| !b.is_mitigated && b.age(tick) <= max_age);

        let Some(last_bar) = bars.last() else { return };
        let close = last_bar.close;
        if close.is_nan() {
            return;
        }

        if let Some(brk) = self.classifier.classify(bars, atr) {
            if let Some(block) = self.block_from_break(bars, &brk) {
                self.blocks.push(block);
            }
            self.last_break = Some(brk);
        }

        for block in &mut self.blocks {
            if block.contains(close) {
                block.touches += 1;
            }
            // Mitigation: a close fully through the zone against the bias.
            let mitigated = match block.bias {
                TradeDirection::Long => close < block.zone_low,
                TradeDirection::Short => close > block.zone_high,
            };
            if mitigated {
                block.is_mitigated = true;
            }
        }
    }

    /// Scan back from the break bar for the last candle opposing the break
    /// direction; its body (or full range) becomes the zone.
    fn block_from_break(&self, bars: &[Bar], brk: &StructureBreak) -> Option<OrderBlock> {
        let break_index = brk.bar_index.min(bars.len().saturating_sub(1));
        let scan_start = break_index.saturating_sub(self.config.scan_back_bars);

        let candle = bars[scan_start..break_index].iter().rev().find(|b| {
            match brk.direction {
                TradeDirection::Long => b.is_bearish(),
                TradeDirection::Short => b.is_bullish(),
            }
        })?;

        let (zone_low, zone_high) = if self.config.use_full_range {
            (candle.low, candle.high)
        } else {
            candle.body()
        };

        Some(OrderBlock {
            zone_high,
            zone_low,
            bias: brk.direction,
            break_kind: brk.kind,
            touches: 0,
            is_mitigated: false,
            created_tick: self.tick,
        })
    }

    /// Blocks still tradeable: unmitigated and within max age.
    pub fn active_blocks(&self) -> impl Iterator<Item = &OrderBlock> {
        let tick = self.tick;
        let max_age = self.config.max_age_bars;
        self.blocks
            .iter()
            .filter(move |b| !b.is_mitigated && b.age(tick) <= max_age)
    }

    /// Every block still held, including ones mitigated this bar (pruned on
    /// the next update). Useful for audit.
    pub fn blocks(&self) -> &[OrderBlock] {
        &self.blocks
    }

    /// The most recent structure break seen by the embedded classifier.
    pub fn last_break(&self) -> Option<&StructureBreak> {
        self.last_break.as_ref()
    }

    pub fn current_trend(&self) -> crate::structure::breaks::Trend {
        self.classifier.current_trend()
    }

    /// Nearest active block to `price`, optionally restricted to one bias.
    pub fn nearest_block(
        &self,
        price: f64,
        bias_filter: Option<TradeDirection>,
    ) -> Option<&OrderBlock> {
        self.active_blocks()
            .filter(|b| bias_filter.map_or(true, |d| b.bias == d))
            .min_by(|a, b| {
                let da = (a.midpoint() - price).abs();
                let db = (b.midpoint() - price).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Touch signal: price sits inside an active block with at most 2
    /// touches. Stop at the zone edge padded by 0.5 ATR, target 2 ATR away,
    /// confidence 0.80 decaying 0.10 per touch.
    pub fn touch_signal(&self, price: f64, atr: f64) -> Option<BlockTouchSignal> {
        if !atr.is_finite() || atr <= 0.0 {
            return None;
        }
        let block = self
            .active_blocks()
            .find(|b| b.contains(price) && b.touches <= 2)?;

        let (stop, target) = match block.bias {
            TradeDirection::Long => (block.zone_low - 0.5 * atr, price + 2.0 * atr),
            TradeDirection::Short => (block.zone_high + 0.5 * atr, price - 2.0 * atr),
        };

        Some(BlockTouchSignal {
            direction: block.bias,
            entry: price,
            stop,
            target,
            confidence: 0.80 - 0.10 * block.touches as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
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

    fn config() -> OrderBlockConfig {
        OrderBlockConfig {
            swing_lookback: 2,
            min_move_atr: 2.0,
            scan_back_bars: 10,
            use_full_range: false,
            max_age_bars: 300,
        }
    }

    /// Swing low 100.0 at index 2, bearish candle at index 4
    /// (open 102.0 > close 101.5), bullish break bar closing 103.5.
    fn breakout_window() -> Vec<Bar> {
        ohlc_bars(&[
            (101.5, 102.0, 101.0, 101.2),
            (101.2, 101.6, 100.6, 100.8),
            (100.8, 101.2, 100.0, 100.9), // swing low 100.0
            (100.9, 101.8, 100.7, 101.5),
            (102.0, 102.2, 101.2, 101.5), // last bearish candle → zone 101.5..102.0
            (101.5, 103.8, 101.3, 103.5), // break bar
        ])
    }

    #[test]
    fn bullish_break_forms_block_from_last_bearish_candle() {
        let mut det = OrderBlockDetector::new(config());
        det.update(&breakout_window(), 1.0);

        let brk = det.last_break().expect("break");
        assert_eq!(brk.kind, BreakKind::Bos);
        assert_eq!(brk.direction, TradeDirection::Long);

        let blocks: Vec<_> = det.active_blocks().collect();
        assert_eq!(blocks.len(), 1);
        let block = blocks[0];
        assert_eq!(block.bias, TradeDirection::Long);
        assert_eq!(block.zone_low, 101.5);
        assert_eq!(block.zone_high, 102.0);
        assert!(!block.is_mitigated);
    }

    #[test]
    fn full_range_zone_uses_high_low() {
        let mut cfg = config();
        cfg.use_full_range = true;
        let mut det = OrderBlockDetector::new(cfg);
        det.update(&breakout_window(), 1.0);
        let block = det.active_blocks().next().unwrap();
        assert_eq!(block.zone_low, 101.2);
        assert_eq!(block.zone_high, 102.2);
    }

    #[test]
    fn touches_accumulate_inside_zone() {
        let mut det = OrderBlockDetector::new(config());
        let mut bars = breakout_window();
        det.update(&bars, 1.0);

        // Price revisits the zone twice.
        for close in [101.8, 101.6] {
            bars.push(Bar {
                close,
                open: close + 0.1,
                high: 104.0,
                low: close - 0.3,
                ..bars.last().unwrap().clone()
            });
            det.update(&bars, 1.0);
        }
        assert_eq!(det.blocks()[0].touches, 2);
    }

    #[test]
    fn mitigation_on_close_through_zone_and_never_reverts() {
        let mut det = OrderBlockDetector::new(config());
        let mut bars = breakout_window();
        det.update(&bars, 1.0);

        // Close below zone_low (101.5) mitigates the bullish block.
        bars.push(Bar {
            open: 101.6,
            high: 104.0,
            low: 100.9,
            close: 101.0,
            ..bars.last().unwrap().clone()
        });
        det.update(&bars, 1.0);
        assert!(det.blocks()[0].is_mitigated);
        assert_eq!(det.active_blocks().count(), 0);

        // Price returning inside the zone must not reactivate it; the block
        // is pruned on the next update.
        bars.push(Bar {
            open: 101.0,
            high: 104.0,
            low: 100.9,
            close: 101.8,
            ..bars.last().unwrap().clone()
        });
        det.update(&bars, 1.0);
        assert!(det.blocks().is_empty());
    }

    #[test]
    fn close_inside_zone_is_not_mitigation() {
        let mut det = OrderBlockDetector::new(config());
        let mut bars = breakout_window();
        det.update(&bars, 1.0);

        bars.push(Bar {
            open: 102.1,
            high: 102.3,
            low: 101.4,
            close: 101.6, // inside zone, not through it
            ..bars.last().unwrap().clone()
        });
        det.update(&bars, 1.0);
        assert!(!det.blocks()[0].is_mitigated);
        assert_eq!(det.blocks()[0].touches, 1);
    }

    #[test]
    fn blocks_age_out() {
        let mut cfg = config();
        cfg.max_age_bars = 3;
        let mut det = OrderBlockDetector::new(cfg);
        let mut bars = breakout_window();
        det.update(&bars, 1.0);
        assert_eq!(det.active_blocks().count(), 1);

        // Four quiet bars away from the zone; age exceeds 3.
        for _ in 0..4 {
            bars.push(Bar {
                open: 103.5,
                high: 103.7,
                low: 103.3,
                close: 103.5,
                ..bars.last().unwrap().clone()
            });
            det.update(&bars, 1.0);
        }
        assert_eq!(det.active_blocks().count(), 0);
    }

    #[test]
    fn touch_signal_levels_and_confidence_decay() {
        let mut det = OrderBlockDetector::new(config());
        let bars = breakout_window();
        det.update(&bars, 1.0);

        // Price inside the 101.5..102.0 zone, zero touches so far.
        let sig = det.touch_signal(101.7, 1.0).expect("signal");
        assert_eq!(sig.direction, TradeDirection::Long);
        assert!((sig.stop - (101.5 - 0.5)).abs() < 1e-9);
        assert!((sig.target - (101.7 + 2.0)).abs() < 1e-9);
        assert!((sig.confidence - 0.80).abs() < 1e-9);

        // Two touches → confidence 0.60; three → no signal.
        let mut det2 = OrderBlockDetector::new(config());
        let mut bars2 = breakout_window();
        det2.update(&bars2, 1.0);
        for _ in 0..2 {
            bars2.push(Bar {
                open: 101.8,
                high: 104.0,
                low: 101.5,
                close: 101.7,
                ..bars2.last().unwrap().clone()
            });
            det2.update(&bars2, 1.0);
        }
        let sig2 = det2.touch_signal(101.7, 1.0).expect("signal");
        assert!((sig2.confidence - 0.60).abs() < 1e-9);

        bars2.push(Bar {
            open: 101.8,
            high: 104.0,
            low: 101.5,
            close: 101.7,
            ..bars2.last().unwrap().clone()
        });
        det2.update(&bars2, 1.0);
        assert!(det2.touch_signal(101.7, 1.0).is_none());
    }

    #[test]
    fn nearest_block_honors_bias_filter() {
        let mut det = OrderBlockDetector::new(config());
        det.update(&breakout_window(), 1.0);
        assert!(det.nearest_block(101.7, Some(TradeDirection::Short)).is_none());
        let near = det.nearest_block(101.7, Some(TradeDirection::Long)).unwrap();
        assert_eq!(near.bias, TradeDirection::Long);
    }
}
