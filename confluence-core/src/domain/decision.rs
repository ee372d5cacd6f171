//! Decision value objects: graded entry and exit decisions with tagged reasons.
//!
//! Reasons are structured: a machine-matchable `ReasonCode` plus human text.
//! Tests and callers match on codes, never on substrings.

use serde::{Deserialize, Serialize};

use super::ids::{ConfigHash, Ticket};

/// Entry quality tier. Deterministic function of the final score plus the
/// named override rules (trend-alignment downgrade).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryQuality {
    Premium,
    Good,
    Marginal,
    Poor,
    Reject,
}

impl EntryQuality {
    /// Fixed tier mapping over the final 0-100 score.
    /// `min_score_to_enter` is the configurable MARGINAL floor (default 50).
    pub fn from_score(score: f64, min_score_to_enter: f64) -> Self {
        if score >= 85.0 {
            Self::Premium
        } else if score >= 70.0 {
            Self::Good
        } else if score >= min_score_to_enter {
            Self::Marginal
        } else if score >= 20.0 {
            Self::Poor
        } else {
            Self::Reject
        }
    }

    /// Position size multiplier attached to each tier.
    pub fn size_multiplier(self) -> f64 {
        match self {
            Self::Premium => 1.0,
            Self::Good => 0.85,
            Self::Marginal => 0.6,
            Self::Poor => 0.3,
            Self::Reject => 0.0,
        }
    }
}

/// Exit urgency tier, least to most urgent. The derive order makes
/// `Hold < ScaleOut < CloseNow < Emergency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitUrgency {
    Hold,
    ScaleOut,
    CloseNow,
    Emergency,
}

/// Machine-matchable tag for every bonus, penalty, and exit attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    // ── Entry score adjustments ──
    CounterTrend,
    WithTrend,
    OrderBlockConfluence,
    SessionRangeConfluence,
    CombinedConfluence,
    StructureBreakConfirmed,
    StructureBreakUnconfirmed,
    SignalDrift,
    TrendAlignmentDowngrade,
    MomentumOpposed,
    WaitForBetterEntry,
    InsufficientData,

    // ── Pending-entry outcomes ──
    TargetReached,
    WaitTimeout,

    // ── Exit attributions ──
    TrendFlip,
    ProfitGiveback,
    RsiExtreme,
    MacdCross,
    BollingerBreach,
    VolumeClimax,
    RegimeChange,
    ReversalConfluence,
    TimeBased,
}

/// Tagged reason: code for matching, text for humans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub code: ReasonCode,
    pub text: String,
}

impl Reason {
    pub fn new(code: ReasonCode, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }
}

/// Graded, explainable entry decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDecision {
    pub quality: EntryQuality,
    /// Final confluence score, clamped to [0, 100].
    pub score: f64,
    pub should_enter: bool,
    pub size_multiplier: f64,
    /// Suggested better entry price when the current one looks chased.
    pub optimal_entry: Option<f64>,
    /// True when the timing sub-score recommends deferring the entry.
    pub wait_for_better: bool,
    pub reasons: Vec<Reason>,
    pub warnings: Vec<Reason>,
    /// Hash of the scoring configuration that produced this decision.
    pub config_hash: ConfigHash,
}

impl EntryDecision {
    pub fn has_reason(&self, code: ReasonCode) -> bool {
        self.reasons.iter().any(|r| r.code == code)
    }

    pub fn has_warning(&self, code: ReasonCode) -> bool {
        self.warnings.iter().any(|r| r.code == code)
    }
}

/// Exit decision for one open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub ticket: Ticket,
    pub symbol: String,
    pub urgency: ExitUrgency,
    /// Fraction of the position to close, in [0, 1].
    pub close_fraction: f64,
    /// Boosted reversal confluence, in [0, 1]-ish (boost can push past raw).
    pub confidence: f64,
    /// Primary attribution, chosen by fixed priority.
    pub reason: Reason,
    /// Every detector/boost that contributed, for audit.
    pub contributing: Vec<Reason>,
}
