//! Entry side of the engine: confluence scoring plus the deferred-entry
//! scheduler.

pub mod config;
pub mod pending;
pub mod scorer;

pub use config::{EntryConfig, EntryTuning, EntryWeights};
pub use pending::{PendingEntry, PendingEntryScheduler, PendingOutcome, PendingState};
pub use scorer::{EntryRequest, EntryScorer};
