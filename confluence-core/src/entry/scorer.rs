//! Entry confluence scorer.
//!
//! Eight sub-scores in [0,1] (neutral 0.5 when a detector lacks data), a
//! weighted sum scaled to 0-100, then the tuned bonus/penalty adjustments,
//! the fixed tier mapping, and the trend-alignment downgrade override.
//! Stateless: every call reads the structural detectors, never mutates them.

use crate::domain::{
    Bar, ConfigHash, EntryDecision, EntryQuality, Reason, ReasonCode, TradeDirection,
};
use crate::entry::config::EntryConfig;
use crate::error::ConfigError;
use crate::indicators::{adx_series, atr_or_fallback, ema_of_bars, rsi_series};
use crate::levels::{build_levels, proximity_score};
use crate::session::SessionRangeTracker;
use crate::structure::{BreakKind, OrderBlockDetector};

const EPSILON: f64 = 1e-10;
const ATR_FALLBACK_PERIOD: usize = 14;
const RSI_PERIOD: usize = 14;
/// ADX below this reads as a flat market; trend scoring stays neutral.
const ADX_FLAT_FLOOR: f64 = 20.0;

/// One entry-analysis request.
#[derive(Debug, Clone)]
pub struct EntryRequest<'a> {
    pub symbol: &'a str,
    pub direction: TradeDirection,
    /// Candidate entry price (normally the latest close).
    pub price: f64,
    pub bars: &'a [Bar],
    /// Caller-supplied ATR; derived from the window when absent.
    pub atr: Option<f64>,
    /// Where the signal originally fired, for drift scoring.
    pub original_signal_price: Option<f64>,
}

/// Macro trend relative to the requested direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrendState {
    Aligned,
    Opposed,
    Flat,
}

#[derive(Debug, Clone, Copy)]
struct SubScores {
    level_proximity: f64,
    momentum: f64,
    timing: f64,
    price_action: f64,
    structure_break: f64,
    trend_alignment: f64,
    order_block: f64,
    session_range: f64,
}

impl SubScores {
    fn neutral() -> Self {
        Self {
            level_proximity: 0.5,
            momentum: 0.5,
            timing: 0.5,
            price_action: 0.5,
            structure_break: 0.5,
            trend_alignment: 0.5,
            order_block: 0.5,
            session_range: 0.5,
        }
    }

    fn weighted(&self, config: &EntryConfig) -> f64 {
        let w = &config.weights;
        self.level_proximity * w.level_proximity
            + self.momentum * w.momentum
            + self.timing * w.timing
            + self.price_action * w.price_action
            + self.structure_break * w.structure_break
            + self.trend_alignment * w.trend_alignment
            + self.order_block * w.order_block
            + self.session_range * w.session_range
    }
}

/// Stateless entry-quality classifier.
#[derive(Debug, Clone)]
pub struct EntryScorer {
    config: EntryConfig,
    config_hash: ConfigHash,
}

impl EntryScorer {
    /// Fails fast on invalid weights or knobs.
    pub fn new(config: EntryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let canonical = serde_json::to_vec(&config).unwrap_or_default();
        let config_hash = ConfigHash::from_bytes(&canonical);
        Ok(Self {
            config,
            config_hash,
        })
    }

    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &ConfigHash {
        &self.config_hash
    }

    /// Grade a candidate entry against the current structural picture.
    pub fn analyze(
        &self,
        request: &EntryRequest<'_>,
        blocks: &OrderBlockDetector,
        sessions: &SessionRangeTracker,
    ) -> EntryDecision {
        let bars = request.bars;
        let atr = atr_or_fallback(request.atr, bars, ATR_FALLBACK_PERIOD);

        let (Some(atr), Some(_)) = (atr, bars.last()) else {
            return self.insufficient_data_decision();
        };
        if request.price.is_nan() {
            return self.insufficient_data_decision();
        }

        let mut reasons = Vec::new();
        let mut warnings = Vec::new();

        let (scores, trend_state, adx, optimal_entry, wants_wait) =
            self.sub_scores(request, atr, blocks, sessions);

        let mut score = scores.weighted(&self.config) * 100.0;
        score = score.clamp(0.0, 100.0);

        score += self.trend_adjustment(trend_state, adx, &mut reasons);
        score += self.confluence_bonuses(&scores, &mut reasons);
        score += self.structure_adjustment(request.direction, blocks, &mut reasons);
        score -= self.drift_penalty(request, atr, &mut warnings);
        let score = score.clamp(0.0, 100.0);

        let min_score = self.config.min_score_to_enter;
        let mut quality = EntryQuality::from_score(score, min_score);
        let mut size_multiplier = quality.size_multiplier();

        let momentum_opposed = scores.momentum < 0.3;
        if momentum_opposed {
            warnings.push(Reason::new(
                ReasonCode::MomentumOpposed,
                format!("momentum score {:.2} strongly opposes the entry", scores.momentum),
            ));
        }
        let should_enter = score >= min_score && !momentum_opposed;

        if self.config.require_trend_alignment && trend_state == TrendState::Opposed {
            let (downgraded, multiplier) = downgrade_for_misalignment(quality);
            if downgraded != quality {
                warnings.push(Reason::new(
                    ReasonCode::TrendAlignmentDowngrade,
                    format!("trend misaligned: {quality:?} downgraded to {downgraded:?}"),
                ));
                quality = downgraded;
                size_multiplier = multiplier;
            }
        }

        let wait_for_better = self.config.enable_wait_mode && wants_wait;
        if wait_for_better {
            reasons.push(Reason::new(
                ReasonCode::WaitForBetterEntry,
                match optimal_entry {
                    Some(p) => format!("entry looks chased; better entry near {p:.5}"),
                    None => "entry looks chased".to_string(),
                },
            ));
        }

        EntryDecision {
            quality,
            score,
            should_enter,
            size_multiplier,
            optimal_entry: if wait_for_better { optimal_entry } else { None },
            wait_for_better,
            reasons,
            warnings,
            config_hash: self.config_hash.clone(),
        }
    }

    fn insufficient_data_decision(&self) -> EntryDecision {
        let score = 50.0;
        EntryDecision {
            quality: EntryQuality::from_score(score, self.config.min_score_to_enter),
            score,
            should_enter: false,
            size_multiplier: 0.0,
            optimal_entry: None,
            wait_for_better: false,
            reasons: Vec::new(),
            warnings: vec![Reason::new(
                ReasonCode::InsufficientData,
                "bar window too short to resolve ATR; all sub-scores neutral",
            )],
            config_hash: self.config_hash.clone(),
        }
    }

    /// Compute all eight sub-scores plus the trend state, latest ADX, and the
    /// timing verdict.
    fn sub_scores(
        &self,
        request: &EntryRequest<'_>,
        atr: f64,
        blocks: &OrderBlockDetector,
        sessions: &SessionRangeTracker,
    ) -> (SubScores, TrendState, f64, Option<f64>, bool) {
        let bars = request.bars;
        let direction = request.direction;
        let price = request.price;
        let sign = direction.sign();

        let mut scores = SubScores::neutral();

        // Level proximity: closer to a strong level scores higher.
        let levels = build_levels(bars, atr, blocks, &self.config.levels);
        scores.level_proximity = proximity_score(&levels, price, atr);

        // Momentum: RSI displacement from 50 toward the trade direction,
        // discounted in exhaustion territory.
        let rsi = rsi_series(bars, RSI_PERIOD).last().copied().unwrap_or(f64::NAN);
        if !rsi.is_nan() {
            let aligned = (rsi - 50.0) / 50.0 * sign;
            let mut momentum = (0.5 + 0.5 * aligned).clamp(0.0, 1.0);
            let exhausted = match direction {
                TradeDirection::Long => rsi > 70.0,
                TradeDirection::Short => rsi < 30.0,
            };
            if exhausted {
                momentum = 0.5 + (momentum - 0.5) * 0.4;
            }
            scores.momentum = momentum;
        }

        // Timing: extension past the fast EMA in ATRs. Half an ATR of
        // extension is free; beyond that the entry is being chased.
        let ema_fast = ema_of_bars(bars, self.config.levels.ema_fast_period)
            .last()
            .copied()
            .unwrap_or(f64::NAN);
        let mut optimal_entry = None;
        let mut wants_wait = false;
        if !ema_fast.is_nan() {
            let extension = (price - ema_fast) * sign / atr;
            scores.timing = if extension <= 0.5 {
                1.0
            } else {
                (1.0 - (extension - 0.5) / 2.5).clamp(0.0, 1.0)
            };
            if extension > 1.5 {
                wants_wait = true;
                optimal_entry = Some(ema_fast + sign * 0.5 * atr);
            }
        }

        // Price action: how many of the last three closes favor the trade,
        // blended with the latest bar's body dominance.
        if bars.len() >= 3 {
            let tail = &bars[bars.len() - 3..];
            let favorable = tail
                .iter()
                .filter(|b| match direction {
                    TradeDirection::Long => b.is_bullish(),
                    TradeDirection::Short => b.is_bearish(),
                })
                .count() as f64;
            let last = &tail[2];
            let span = last.high - last.low;
            let body = if span > EPSILON {
                ((last.close - last.open) * sign / span).max(0.0)
            } else {
                0.0
            };
            scores.price_action = (favorable / 3.0 * 0.7 + body * 0.3).clamp(0.0, 1.0);
        }

        // Structure break: the latest BOS/ChoCH for or against the trade.
        if let Some(brk) = blocks.last_break() {
            scores.structure_break = if brk.direction == direction {
                match brk.kind {
                    BreakKind::Bos => 1.0,
                    BreakKind::Choch => 0.85,
                }
            } else {
                0.15
            };
        }

        // Macro trend: price vs slow EMA, only meaningful when ADX says the
        // market is actually trending.
        let ema_trend = ema_of_bars(bars, self.config.trend_ema_period)
            .last()
            .copied()
            .unwrap_or(f64::NAN);
        let adx = adx_series(bars, self.config.adx_period)
            .last()
            .copied()
            .unwrap_or(f64::NAN);
        let mut trend_state = TrendState::Flat;
        if !ema_trend.is_nan() && !adx.is_nan() && adx >= ADX_FLAT_FLOOR {
            let strength = ((adx - ADX_FLAT_FLOOR) / 20.0).clamp(0.0, 1.0);
            if (price - ema_trend) * sign > 0.0 {
                trend_state = TrendState::Aligned;
                scores.trend_alignment = 0.7 + 0.3 * strength;
            } else {
                trend_state = TrendState::Opposed;
                scores.trend_alignment = (0.3 - 0.2 * strength).max(0.1);
            }
        }

        // Order block: price inside or near a zone whose bias matches.
        scores.order_block = match blocks.nearest_block(price, Some(direction)) {
            Some(block) if block.contains(price) => {
                (0.9 - 0.05 * block.touches as f64).clamp(0.6, 0.9)
            }
            Some(block) => {
                let edge_distance = if price > block.zone_high {
                    price - block.zone_high
                } else {
                    block.zone_low - price
                };
                match edge_distance / atr {
                    d if d <= 1.0 => 0.75,
                    d if d <= 2.0 => 0.6,
                    _ => 0.5,
                }
            }
            None => match blocks.nearest_block(price, Some(direction.opposite())) {
                Some(block) if block.contains(price) => 0.2,
                _ => 0.5,
            },
        };

        // Session range: confirmed breakout in our direction is strong
        // confluence; an opposing breakout is a red flag.
        if let Some(last_bar) = bars.last() {
            if let Some(range) = sessions.current_range(last_bar.timestamp) {
                scores.session_range = if range.rejected {
                    0.45
                } else if !range.is_complete {
                    0.5
                } else {
                    match range.breakout {
                        Some(d) if d == direction => 0.9,
                        Some(_) => 0.15,
                        None => {
                            let beyond = match direction {
                                TradeDirection::Long => price > range.high,
                                TradeDirection::Short => price < range.low,
                            };
                            if beyond {
                                0.7
                            } else if range.contains(price) {
                                0.4
                            } else {
                                0.35
                            }
                        }
                    }
                };
            }
        }

        (scores, trend_state, adx, optimal_entry, wants_wait)
    }

    /// Mutually exclusive counter-trend penalty or with-trend bonus.
    fn trend_adjustment(
        &self,
        trend_state: TrendState,
        adx: f64,
        reasons: &mut Vec<Reason>,
    ) -> f64 {
        let t = &self.config.tuning;
        match trend_state {
            TrendState::Opposed => {
                let mut penalty = t.counter_trend_penalty;
                if adx > 30.0 {
                    penalty += t.counter_trend_adx30_penalty;
                }
                if adx > 40.0 {
                    penalty += t.counter_trend_adx40_penalty;
                }
                reasons.push(Reason::new(
                    ReasonCode::CounterTrend,
                    format!("against the macro trend (ADX {adx:.1}), penalty {penalty:.0}"),
                ));
                -penalty
            }
            TrendState::Aligned => {
                reasons.push(Reason::new(
                    ReasonCode::WithTrend,
                    format!("with the macro trend, bonus {:.0}", t.with_trend_bonus),
                ));
                t.with_trend_bonus
            }
            TrendState::Flat => 0.0,
        }
    }

    fn confluence_bonuses(&self, scores: &SubScores, reasons: &mut Vec<Reason>) -> f64 {
        let t = &self.config.tuning;
        let mut bonus = 0.0;
        if scores.order_block > t.order_block_gate {
            bonus += t.order_block_bonus;
            reasons.push(Reason::new(
                ReasonCode::OrderBlockConfluence,
                format!("order-block score {:.2} clears gate", scores.order_block),
            ));
        }
        if scores.session_range > t.session_range_gate {
            bonus += t.session_range_bonus;
            reasons.push(Reason::new(
                ReasonCode::SessionRangeConfluence,
                format!("session-range score {:.2} clears gate", scores.session_range),
            ));
        }
        if scores.order_block > t.combined_confluence_gate
            && scores.session_range > t.combined_confluence_gate
        {
            bonus += t.combined_confluence_bonus;
            reasons.push(Reason::new(
                ReasonCode::CombinedConfluence,
                "order block and session range both confluent",
            ));
        }
        bonus
    }

    /// +5 when the latest break backs the trade, -10 when it opposes it.
    fn structure_adjustment(
        &self,
        direction: TradeDirection,
        blocks: &OrderBlockDetector,
        reasons: &mut Vec<Reason>,
    ) -> f64 {
        let t = &self.config.tuning;
        match blocks.last_break() {
            Some(brk) if brk.direction == direction => {
                reasons.push(Reason::new(
                    ReasonCode::StructureBreakConfirmed,
                    format!("{:?} break confirms the direction", brk.kind),
                ));
                t.bos_confirmed_bonus
            }
            Some(brk) => {
                reasons.push(Reason::new(
                    ReasonCode::StructureBreakUnconfirmed,
                    format!("latest {:?} break opposes the direction", brk.kind),
                ));
                -t.bos_unconfirmed_penalty
            }
            None => 0.0,
        }
    }

    /// Drift from the original signal price beyond the free zone, scaled to
    /// the max penalty.
    fn drift_penalty(
        &self,
        request: &EntryRequest<'_>,
        atr: f64,
        warnings: &mut Vec<Reason>,
    ) -> f64 {
        let t = &self.config.tuning;
        let Some(origin) = request.original_signal_price else {
            return 0.0;
        };
        if origin.is_nan() || atr < EPSILON {
            return 0.0;
        }
        let drift_atr = (request.price - origin).abs() / atr;
        let excess = drift_atr - t.signal_drift_free_atr;
        if excess <= 0.0 {
            return 0.0;
        }
        let span = (t.signal_drift_full_atr - t.signal_drift_free_atr).max(EPSILON);
        let penalty = t.signal_drift_max_penalty * (excess / span).clamp(0.0, 1.0);
        warnings.push(Reason::new(
            ReasonCode::SignalDrift,
            format!("price drifted {drift_atr:.2} ATR from signal origin, penalty {penalty:.1}"),
        ));
        penalty
    }
}

/// Tier override when trend alignment is required but unmet. The returned
/// multiplier replaces the tier multiplier.
fn downgrade_for_misalignment(quality: EntryQuality) -> (EntryQuality, f64) {
    match quality {
        EntryQuality::Premium | EntryQuality::Good => (EntryQuality::Marginal, 0.5),
        EntryQuality::Marginal => (EntryQuality::Poor, 0.25),
        other => (other, other.size_multiplier()),
    }
}
