//! Session opening-range tracking.
//!
//! For each configured session (UTC start time + window length) the tracker
//! opens exactly one `OpeningRange` per session per date, extends it while
//! the window is live, freezes it when the window elapses, and flags a
//! breakout at most once: when the last `confirmation_closes` closes all
//! land beyond one edge and the range size passes the ATR sanity band.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, TradeDirection};

/// A configured trading session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSpec {
    /// Stable identifier, used as part of the range key.
    pub id: String,
    /// Human-readable name ("London open").
    pub label: String,
    /// Session start, UTC time-of-day.
    pub start: NaiveTime,
    /// Opening-range window length in minutes.
    pub range_minutes: u32,
    /// Closes beyond the edge required to confirm a breakout. 0 confirms on
    /// the first beyond-close.
    pub confirmation_closes: usize,
    /// Range-size sanity band, in ATR multiples. Ranges outside the band are
    /// rejected and never flag a breakout.
    pub min_range_atr: f64,
    pub max_range_atr: f64,
}

impl SessionSpec {
    pub fn window_on(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = date.and_time(self.start).and_utc();
        (start, start + Duration::minutes(self.range_minutes as i64))
    }
}

/// The high/low established during one session's opening window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningRange {
    pub session_id: String,
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub is_complete: bool,
    /// Set at most once, after completion.
    pub breakout: Option<TradeDirection>,
    /// Range size failed the ATR sanity band; no breakout will ever flag.
    pub rejected: bool,
}

impl OpeningRange {
    pub fn size(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// A confirmed opening-range breakout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBreakoutSignal {
    pub session_id: String,
    pub direction: TradeDirection,
    pub entry: f64,
    /// Opposite range edge.
    pub stop: f64,
    /// Entry ± 2 × range size.
    pub target: f64,
    pub range_high: f64,
    pub range_low: f64,
}

/// Tracks one `OpeningRange` per (session, date). One instance per symbol.
#[derive(Debug, Clone)]
pub struct SessionRangeTracker {
    sessions: Vec<SessionSpec>,
    ranges: BTreeMap<(String, NaiveDate), OpeningRange>,
}

impl SessionRangeTracker {
    pub fn new(sessions: Vec<SessionSpec>) -> Self {
        Self {
            sessions,
            ranges: BTreeMap::new(),
        }
    }

    /// Advance one bar (`bars.last()` is the live bar). Returns breakout
    /// signals confirmed on this bar: at most one per session range.
    pub fn update(&mut self, bars: &[Bar], atr: f64) -> Vec<RangeBreakoutSignal> {
        let Some(bar) = bars.last() else {
            return Vec::new();
        };
        if bar.is_void() {
            return Vec::new();
        }
        let now = bar.timestamp;
        let date = now.date_naive();

        // Prior-date ranges are dead weight; keep the map bounded.
        self.ranges.retain(|(_, d), _| *d == date);

        let mut signals = Vec::new();
        for session in &self.sessions {
            let (start, end) = session.window_on(date);
            let key = (session.id.clone(), date);

            if now >= start && now < end {
                let range = self.ranges.entry(key).or_insert_with(|| OpeningRange {
                    session_id: session.id.clone(),
                    date,
                    high: bar.high,
                    low: bar.low,
                    is_complete: false,
                    breakout: None,
                    rejected: false,
                });
                range.high = range.high.max(bar.high);
                range.low = range.low.min(bar.low);
                continue;
            }

            let Some(range) = self.ranges.get_mut(&key) else {
                continue;
            };
            if now < start {
                continue;
            }

            if !range.is_complete {
                range.is_complete = true;
                // Size sanity check happens once, at freeze time.
                let size = range.size();
                if atr.is_finite() && atr > 0.0 {
                    if size < session.min_range_atr * atr || size > session.max_range_atr * atr {
                        range.rejected = true;
                    }
                } else {
                    range.rejected = true;
                }
            }

            if range.rejected || range.breakout.is_some() {
                continue;
            }

            let needed = session.confirmation_closes.max(1);
            if bars.len() < needed {
                continue;
            }
            let tail = &bars[bars.len() - needed..];
            let direction = if tail.iter().all(|b| b.close > range.high) {
                Some(TradeDirection::Long)
            } else if tail.iter().all(|b| b.close < range.low) {
                Some(TradeDirection::Short)
            } else {
                None
            };

            if let Some(direction) = direction {
                range.breakout = Some(direction);
                let entry = bar.close;
                let size = range.size();
                let (stop, target) = match direction {
                    TradeDirection::Long => (range.low, entry + 2.0 * size),
                    TradeDirection::Short => (range.high, entry - 2.0 * size),
                };
                signals.push(RangeBreakoutSignal {
                    session_id: session.id.clone(),
                    direction,
                    entry,
                    stop,
                    target,
                    range_high: range.high,
                    range_low: range.low,
                });
            }
        }

        signals
    }

    /// Range for a specific session and date, if one was opened.
    pub fn range(&self, session_id: &str, date: NaiveDate) -> Option<&OpeningRange> {
        self.ranges.get(&(session_id.to_string(), date))
    }

    /// The most recently started range on `now`'s date whose session has
    /// already begun. This is what entry scoring reads.
    pub fn current_range(&self, now: DateTime<Utc>) -> Option<&OpeningRange> {
        let date = now.date_naive();
        self.sessions
            .iter()
            .filter(|s| s.window_on(date).0 <= now)
            .max_by_key(|s| s.start)
            .and_then(|s| self.ranges.get(&(s.id.clone(), date)))
    }

    pub fn sessions(&self) -> &[SessionSpec] {
        &self.sessions
    }
}
