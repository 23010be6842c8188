//! Shared primitive types used across the persistence core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Row id assigned by the store to a save record.
pub type SaveId = i64;

/// Unix time in milliseconds.
pub type Millis = i64;

/// Stable session identifier (uuid v4 string).
pub type SessionId = String;

/// Save tier. Each tier has its own slot, cooldown and visibility policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTier {
    Auto,
    Quick,
    Manual,
}

impl SaveTier {
    pub const ALL: [SaveTier; 3] = [SaveTier::Auto, SaveTier::Quick, SaveTier::Manual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto   => "auto",
            Self::Quick  => "quick",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto"   => Some(Self::Auto),
            "quick"  => Some(Self::Quick),
            "manual" => Some(Self::Manual),
            _        => None,
        }
    }

    /// Whether a failed save in this tier must be shown to the player.
    pub fn failure_is_user_visible(&self) -> bool {
        !matches!(self, Self::Auto)
    }
}

impl fmt::Display for SaveTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
