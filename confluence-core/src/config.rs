//! Engine configuration: every knob in one serializable document.
//!
//! Validated once, up front; a validated config can build any number of
//! per-symbol engines. The BLAKE3 hash of the canonical JSON form is stamped
//! into entry decisions for traceability.

use serde::{Deserialize, Serialize};

use crate::domain::ConfigHash;
use crate::entry::EntryConfig;
use crate::error::ConfigError;
use crate::exit::ExitConfig;
use crate::session::SessionSpec;
use crate::structure::OrderBlockConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub entry: EntryConfig,
    pub exit: ExitConfig,
    pub order_blocks: OrderBlockConfig,
    pub sessions: Vec<SessionSpec>,
    /// Bar budget handed to the pending-entry scheduler for deferred entries.
    pub pending_max_wait_bars: u32,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.entry.validate()?;
        self.exit.validate()?;

        if self.order_blocks.swing_lookback == 0 {
            return Err(ConfigError::InvalidField {
                field: "order_blocks.swing_lookback",
                message: "must be >= 1".to_string(),
            });
        }
        if !(self.order_blocks.min_move_atr > 0.0) {
            return Err(ConfigError::InvalidField {
                field: "order_blocks.min_move_atr",
                message: format!("{} must be positive", self.order_blocks.min_move_atr),
            });
        }

        for session in &self.sessions {
            if session.range_minutes == 0 {
                return Err(ConfigError::InvalidField {
                    field: "sessions.range_minutes",
                    message: format!("session '{}' has a zero-length window", session.id),
                });
            }
            if !(session.min_range_atr > 0.0 && session.min_range_atr < session.max_range_atr) {
                return Err(ConfigError::InvalidField {
                    field: "sessions.range_atr",
                    message: format!(
                        "session '{}' needs 0 < min_range_atr < max_range_atr",
                        session.id
                    ),
                });
            }
        }

        if self.pending_max_wait_bars == 0 {
            return Err(ConfigError::InvalidField {
                field: "pending_max_wait_bars",
                message: "must be >= 1".to_string(),
            });
        }
        Ok(())
    }

    /// Deterministic fingerprint of this exact configuration.
    pub fn hash(&self) -> ConfigHash {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        ConfigHash::from_bytes(&canonical)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry: EntryConfig::default(),
            exit: ExitConfig::default(),
            order_blocks: OrderBlockConfig::default(),
            sessions: Vec::new(),
            pending_max_wait_bars: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn london() -> SessionSpec {
        SessionSpec {
            id: "london".to_string(),
            label: "London open".to_string(),
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            range_minutes: 30,
            confirmation_closes: 1,
            min_range_atr: 0.5,
            max_range_atr: 3.0,
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            sessions: vec![london()],
            pending_max_wait_bars: 10,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn default_with_session_validates() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn zero_window_session_rejected() {
        let mut cfg = config();
        cfg.sessions[0].range_minutes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_range_band_rejected() {
        let mut cfg = config();
        cfg.sessions[0].min_range_atr = 4.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hash_tracks_content() {
        let a = config();
        let mut b = config();
        assert_eq!(a.hash(), b.hash());
        b.entry.min_score_to_enter = 60.0;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn toml_round_trip() {
        let cfg = config();
        let text = cfg.to_toml().unwrap();
        let back = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(cfg, back);
        assert_eq!(cfg.hash(), back.hash());
    }
}
