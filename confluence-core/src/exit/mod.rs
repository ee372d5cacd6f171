//! Exit side of the engine: the reversal detector ensemble and the oracle
//! that grades exit urgency.

pub mod detectors;
pub mod oracle;

pub use detectors::{
    BollingerBreach, ExitContext, MacdCross, ProfitGiveback, ReversalDetector, ReversalSignal,
    RsiExtreme, TrendFlip, VolumeClimax,
};
pub use oracle::{
    AdvisoryInputs, ExitConfig, ExitOracle, ExitThresholds, ExitToggles, ExitWeights,
};
