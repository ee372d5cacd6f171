//! Pending-entry scheduler: the "wait for better entry" state machine.
//!
//! Each deferred entry is `Pending` until it `Fired` (target touched in the
//! signal's favor, or wait budget exhausted) or `Expired` (one hour
//! wall-clock with no fill). Completed entries stay visible for one hour for
//! audit, then an explicit `purge_completed` pass drops them.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ReasonCode, SignalId, TradeDirection};

/// Wall-clock bound on a pending entry's whole life, and on how long a
/// completed one is retained for audit.
fn wall_clock_limit() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    Pending,
    Fired,
    Expired,
}

/// One deferred entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub signal_id: SignalId,
    pub symbol: String,
    pub direction: TradeDirection,
    /// Price at which the deferred entry becomes attractive.
    pub target_price: f64,
    pub bars_waited: u32,
    pub max_wait: u32,
    pub state: PendingState,
    pub registered_at: DateTime<Utc>,
    /// Set when the entry leaves `Pending`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl PendingEntry {
    pub fn is_active(&self) -> bool {
        self.state == PendingState::Pending
    }
}

/// How a pending entry resolved on this bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOutcome {
    pub signal_id: SignalId,
    pub symbol: String,
    pub direction: TradeDirection,
    pub code: ReasonCode,
    /// Fill price for fired entries.
    pub entry_price: Option<f64>,
    /// 1.0 on target fills, 0.5 on timeout fills.
    pub size_multiplier: f64,
}

/// Owns all pending entries for one symbol stream.
#[derive(Debug, Clone, Default)]
pub struct PendingEntryScheduler {
    entries: HashMap<SignalId, PendingEntry>,
}

impl PendingEntryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deferred entry. Re-registering an id replaces the old one.
    pub fn register(
        &mut self,
        signal_id: SignalId,
        symbol: impl Into<String>,
        direction: TradeDirection,
        target_price: f64,
        max_wait: u32,
        now: DateTime<Utc>,
    ) {
        self.entries.insert(
            signal_id.clone(),
            PendingEntry {
                signal_id,
                symbol: symbol.into(),
                direction,
                target_price,
                bars_waited: 0,
                max_wait,
                state: PendingState::Pending,
                registered_at: now,
                completed_at: None,
            },
        );
    }

    /// Advance every pending entry for `symbol` by one bar at `price`.
    ///
    /// Target fills take priority over timeouts on the same bar. An entry
    /// past the one-hour wall clock expires without filling even if its bar
    /// budget is not exhausted.
    pub fn on_bar(&mut self, symbol: &str, price: f64, now: DateTime<Utc>) -> Vec<PendingOutcome> {
        let mut outcomes = Vec::new();
        if price.is_nan() {
            return outcomes;
        }

        for entry in self.entries.values_mut() {
            if !entry.is_active() || entry.symbol != symbol {
                continue;
            }
            entry.bars_waited += 1;

            // Target reached: price at or beyond target in the signal's favor
            // (a long wants to buy the dip at or below target).
            let reached = match entry.direction {
                TradeDirection::Long => price <= entry.target_price,
                TradeDirection::Short => price >= entry.target_price,
            };
            if reached {
                entry.state = PendingState::Fired;
                entry.completed_at = Some(now);
                outcomes.push(PendingOutcome {
                    signal_id: entry.signal_id.clone(),
                    symbol: entry.symbol.clone(),
                    direction: entry.direction,
                    code: ReasonCode::TargetReached,
                    entry_price: Some(price),
                    size_multiplier: 1.0,
                });
                continue;
            }

            if now - entry.registered_at >= wall_clock_limit() {
                entry.state = PendingState::Expired;
                entry.completed_at = Some(now);
                continue;
            }

            if entry.bars_waited >= entry.max_wait {
                // Wait budget exhausted: take the current price at half size.
                entry.state = PendingState::Fired;
                entry.completed_at = Some(now);
                outcomes.push(PendingOutcome {
                    signal_id: entry.signal_id.clone(),
                    symbol: entry.symbol.clone(),
                    direction: entry.direction,
                    code: ReasonCode::WaitTimeout,
                    entry_price: Some(price),
                    size_multiplier: 0.5,
                });
            }
        }

        outcomes
    }

    /// Drop completed entries older than the one-hour retention window.
    /// Separate from `on_bar` so audit reads see completed entries first.
    pub fn purge_completed(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, e| {
            e.is_active()
                || e.completed_at
                    .map_or(true, |t| now - t < wall_clock_limit())
        });
    }

    pub fn get(&self, signal_id: &SignalId) -> Option<&PendingEntry> {
        self.entries.get(signal_id)
    }

    pub fn active_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_active()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
