//! Trade direction: long/short with sign helpers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Candidate trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    /// +1.0 for long, -1.0 for short. Used to fold symmetric long/short
    /// arithmetic into one expression.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    /// True if a price move from `from` to `to` is in this direction's favor.
    pub fn favors(self, from: f64, to: f64) -> bool {
        (to - from) * self.sign() > 0.0
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_opposite() {
        assert_eq!(TradeDirection::Long.sign(), 1.0);
        assert_eq!(TradeDirection::Short.sign(), -1.0);
        assert_eq!(TradeDirection::Long.opposite(), TradeDirection::Short);
    }

    #[test]
    fn favors_is_directional() {
        assert!(TradeDirection::Long.favors(100.0, 101.0));
        assert!(!TradeDirection::Long.favors(100.0, 99.0));
        assert!(TradeDirection::Short.favors(100.0, 99.0));
        assert!(!TradeDirection::Short.favors(100.0, 100.0));
    }

    #[test]
    fn serde_lowercase() {
        assert_eq!(serde_json::to_string(&TradeDirection::Long).unwrap(), "\"long\"");
    }
}
