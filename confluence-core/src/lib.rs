//! Confluence decision engine.
//!
//! Converts a candidate trade direction plus a window of historical bars
//! into a graded, explainable entry or exit decision:
//!
//! - [`structure`]: fractal swing points, BOS/ChoCH classification, order
//!   blocks.
//! - [`session`]: opening ranges per configured session, with confirmed
//!   breakouts.
//! - [`levels`]: stateless support/resistance/round-number level registry.
//! - [`entry`]: the eight-factor confluence scorer and the deferred-entry
//!   scheduler.
//! - [`exit`]: the reversal detector ensemble and the exit-urgency oracle.
//! - [`engine`]: per-symbol assembly and the symbol registry.
//!
//! The engine performs no I/O: bars, ATR, positions, and advisory signals
//! come in, decision value objects go out. Invalid configuration fails fast
//! at construction; insufficient data degrades to neutral scores.

pub mod config;
pub mod domain;
pub mod engine;
pub mod entry;
pub mod error;
pub mod exit;
pub mod indicators;
pub mod levels;
pub mod session;
pub mod structure;

pub use config::EngineConfig;
pub use domain::{
    Bar, ConfigHash, EntryDecision, EntryQuality, ExitDecision, ExitUrgency, PositionSnapshot,
    Reason, ReasonCode, SignalId, Ticket, TradeDirection,
};
pub use engine::{BarEvents, EngineRegistry, SymbolEngine};
pub use error::ConfigError;
