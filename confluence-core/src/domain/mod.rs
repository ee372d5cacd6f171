//! Domain types: bars, directions, positions, decisions, identifiers.

pub mod bar;
pub mod decision;
pub mod direction;
pub mod ids;
pub mod position;

pub use bar::Bar;
pub use decision::{
    EntryDecision, EntryQuality, ExitDecision, ExitUrgency, Reason, ReasonCode,
};
pub use direction::TradeDirection;
pub use ids::{ConfigHash, SignalId, Ticket};
pub use position::PositionSnapshot;
