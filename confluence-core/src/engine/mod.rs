//! Per-symbol engine assembly.
//!
//! `SymbolEngine` owns the four stateful pieces (order-block detector,
//! session tracker, pending scheduler, exit oracle) plus the stateless
//! scorer. `EngineRegistry` hands out one engine per symbol from a single
//! validated config: detector state is never global and never shared
//! between symbols.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::domain::{Bar, EntryDecision, ExitDecision, PositionSnapshot, SignalId, TradeDirection};
use crate::entry::{EntryRequest, EntryScorer, PendingEntryScheduler, PendingOutcome};
use crate::error::ConfigError;
use crate::exit::{AdvisoryInputs, ExitOracle};
use crate::indicators::atr_or_fallback;
use crate::session::{RangeBreakoutSignal, SessionRangeTracker};
use crate::structure::OrderBlockDetector;

const ATR_FALLBACK_PERIOD: usize = 14;

/// Everything that surfaced while advancing one bar.
#[derive(Debug, Clone, Default)]
pub struct BarEvents {
    pub breakouts: Vec<RangeBreakoutSignal>,
    pub pending: Vec<PendingOutcome>,
}

/// The full decision engine for one symbol.
#[derive(Debug)]
pub struct SymbolEngine {
    symbol: String,
    max_wait_bars: u32,
    scorer: EntryScorer,
    blocks: OrderBlockDetector,
    sessions: SessionRangeTracker,
    scheduler: PendingEntryScheduler,
    oracle: ExitOracle,
}

impl SymbolEngine {
    pub fn new(symbol: impl Into<String>, config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            symbol: symbol.into(),
            max_wait_bars: config.pending_max_wait_bars,
            scorer: EntryScorer::new(config.entry.clone())?,
            blocks: OrderBlockDetector::new(config.order_blocks.clone()),
            sessions: SessionRangeTracker::new(config.sessions.clone()),
            scheduler: PendingEntryScheduler::new(),
            oracle: ExitOracle::new(config.exit.clone())?,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Advance all stateful detectors one bar. `bars` is the full
    /// oldest-to-newest window ending at the live bar.
    pub fn on_bar(&mut self, bars: &[Bar], atr: Option<f64>) -> BarEvents {
        let mut events = BarEvents::default();
        let Some(last) = bars.last() else {
            return events;
        };

        if let Some(atr) = atr_or_fallback(atr, bars, ATR_FALLBACK_PERIOD) {
            self.blocks.update(bars, atr);
            events.breakouts = self.sessions.update(bars, atr);
        }

        let now = last.timestamp;
        events.pending = self.scheduler.on_bar(&self.symbol, last.close, now);
        self.scheduler.purge_completed(now);
        events
    }

    /// Grade a candidate entry against the current structural picture.
    pub fn analyze_entry(&self, request: &EntryRequest<'_>) -> EntryDecision {
        self.scorer.analyze(request, &self.blocks, &self.sessions)
    }

    /// Defer an entry the scorer flagged as worth waiting for.
    pub fn defer_entry(
        &mut self,
        signal_id: SignalId,
        direction: TradeDirection,
        target_price: f64,
        now: DateTime<Utc>,
    ) {
        self.scheduler.register(
            signal_id,
            self.symbol.clone(),
            direction,
            target_price,
            self.max_wait_bars,
            now,
        );
    }

    /// Evaluate exit urgency for the open positions on this symbol.
    pub fn evaluate_exits(
        &mut self,
        positions: &[PositionSnapshot],
        bars: &[Bar],
        advisory: &AdvisoryInputs,
    ) -> Vec<ExitDecision> {
        self.oracle.evaluate(positions, bars, advisory)
    }

    pub fn position_closed(&mut self, ticket: crate::domain::Ticket) {
        self.oracle.position_closed(ticket);
    }

    pub fn order_blocks(&self) -> &OrderBlockDetector {
        &self.blocks
    }

    pub fn session_ranges(&self) -> &SessionRangeTracker {
        &self.sessions
    }

    pub fn pending(&self) -> &PendingEntryScheduler {
        &self.scheduler
    }
}

/// Owns one `SymbolEngine` per symbol, all built from the same validated
/// configuration.
#[derive(Debug)]
pub struct EngineRegistry {
    config: EngineConfig,
    engines: HashMap<String, SymbolEngine>,
}

impl EngineRegistry {
    /// Fails fast on an invalid configuration; engines built later cannot
    /// fail validation again.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            engines: HashMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The engine for `symbol`, constructed lazily on first use.
    pub fn engine_for(&mut self, symbol: &str) -> Result<&mut SymbolEngine, ConfigError> {
        if !self.engines.contains_key(symbol) {
            let engine = SymbolEngine::new(symbol, &self.config)?;
            self.engines.insert(symbol.to_string(), engine);
        }
        Ok(self
            .engines
            .get_mut(symbol)
            .expect("engine inserted above"))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn flat_bars(n: usize) -> Vec<Bar> {
        let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        (0..n)
            .map(|i| Bar {
                symbol: "EURUSD".to_string(),
                timestamp: base + chrono::Duration::minutes(i as i64),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn registry_validates_once_and_builds_lazily() {
        let mut registry = EngineRegistry::new(config()).unwrap();
        assert_eq!(registry.symbols().count(), 0);
        registry.engine_for("EURUSD").unwrap();
        registry.engine_for("EURUSD").unwrap();
        registry.engine_for("GBPUSD").unwrap();
        assert_eq!(registry.symbols().count(), 2);
    }

    #[test]
    fn invalid_config_rejected_at_registry_construction() {
        let mut cfg = config();
        cfg.entry.weights.momentum += 0.1;
        assert!(EngineRegistry::new(cfg).is_err());
    }

    #[test]
    fn engines_keep_independent_state() {
        let mut registry = EngineRegistry::new(config()).unwrap();
        let bars = flat_bars(20);
        let now = bars.last().unwrap().timestamp;

        let eur = registry.engine_for("EURUSD").unwrap();
        eur.defer_entry(SignalId::new("a"), TradeDirection::Long, 99.0, now);
        assert_eq!(eur.pending().active_count(), 1);

        let gbp = registry.engine_for("GBPUSD").unwrap();
        assert_eq!(gbp.pending().active_count(), 0);
    }

    #[test]
    fn on_bar_drives_scheduler_even_without_atr() {
        let mut engine = SymbolEngine::new("EURUSD", &config()).unwrap();
        let bars = flat_bars(2); // too short for the ATR fallback
        let now = bars.last().unwrap().timestamp;
        engine.defer_entry(SignalId::new("a"), TradeDirection::Long, 100.5, now);

        // Long target above current price fills immediately on the next bar.
        let events = engine.on_bar(&bars, None);
        assert_eq!(events.pending.len(), 1);
    }

    #[test]
    fn analyze_entry_runs_end_to_end() {
        let mut engine = SymbolEngine::new("EURUSD", &config()).unwrap();
        let bars = flat_bars(60);
        engine.on_bar(&bars, Some(1.0));
        let decision = engine.analyze_entry(&EntryRequest {
            symbol: "EURUSD",
            direction: TradeDirection::Long,
            price: 100.0,
            bars: &bars,
            atr: Some(1.0),
            original_signal_price: None,
        });
        assert!(decision.score >= 0.0 && decision.score <= 100.0);
    }
}
