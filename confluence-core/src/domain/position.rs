//! Position snapshot: the caller-supplied view of an open position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::direction::TradeDirection;
use super::ids::Ticket;

/// Read-only snapshot of one open position, supplied per exit evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub current_price: f64,
    pub volume: f64,
    pub unrealized_pnl: f64,
    pub entry_time: DateTime<Utc>,
}

impl PositionSnapshot {
    /// Unrealized P&L as a percentage of entry notional.
    ///
    /// Epsilon-guarded: a zero-notional snapshot reports 0% rather than
    /// dividing by zero.
    pub fn pnl_pct(&self) -> f64 {
        let notional = (self.entry_price * self.volume).abs();
        if notional < f64::EPSILON {
            return 0.0;
        }
        self.unrealized_pnl / notional * 100.0
    }

    /// A corrupted snapshot (NaN prices/volume or non-positive entry) must
    /// not abort batch evaluation; callers skip it.
    pub fn is_valid(&self) -> bool {
        self.entry_price.is_finite()
            && self.current_price.is_finite()
            && self.volume.is_finite()
            && self.unrealized_pnl.is_finite()
            && self.entry_price > 0.0
            && self.volume > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(pnl: f64) -> PositionSnapshot {
        PositionSnapshot {
            ticket: Ticket(42),
            symbol: "EURUSD".into(),
            direction: TradeDirection::Long,
            entry_price: 100.0,
            current_price: 102.0,
            volume: 1.0,
            unrealized_pnl: pnl,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn pnl_pct_of_entry_notional() {
        assert!((snapshot(2.0).pnl_pct() - 2.0).abs() < 1e-12);
        assert!((snapshot(-5.0).pnl_pct() + 5.0).abs() < 1e-12);
    }

    #[test]
    fn zero_notional_reports_zero_pct() {
        let mut s = snapshot(2.0);
        s.volume = 0.0;
        assert_eq!(s.pnl_pct(), 0.0);
        assert!(!s.is_valid());
    }

    #[test]
    fn nan_price_is_invalid() {
        let mut s = snapshot(2.0);
        s.current_price = f64::NAN;
        assert!(!s.is_valid());
    }
}
