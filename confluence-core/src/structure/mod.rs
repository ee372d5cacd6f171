//! Market structure detection: swing points, structure breaks, order blocks.
//!
//! Leaf-to-root: the fractal swing detector feeds the BOS/ChoCH classifier,
//! which feeds the order-block detector. Only the order-block detector owns
//! mutable state (the active-block set plus its embedded classifier).

pub mod breaks;
pub mod order_block;
pub mod swing;

pub use breaks::{BreakKind, StructureBreak, StructureBreakClassifier, Trend};
pub use order_block::{BlockTouchSignal, OrderBlock, OrderBlockConfig, OrderBlockDetector};
pub use swing::{detect_swing_points, last_swing_high, last_swing_low, SwingPoint};
