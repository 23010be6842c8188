//! Snapshot serialization — full world state to/from JSON.
//!
//! A snapshot is built on demand by the aggregator, handed to the store
//! inside a SaveRecord, and dropped. It is never kept as a live object.

use crate::{
    merge::StateTree,
    narrative::SceneNode,
    state::WorldState,
    types::{Millis, SaveId, SaveTier, SessionId},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Bumped whenever the default template gains or changes fields.
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    #[serde(flatten)]
    pub state: WorldState,
    /// Collaborator blobs by registration key.
    #[serde(default)]
    pub subsystems: BTreeMap<String, Value>,
    /// Rendered transcript markup. Opaque, replayed verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl Snapshot {
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Narrative position at capture time. The node is a full copy: generated
/// branches cannot be looked up by id when the save is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingSceneData {
    pub scene:              SceneNode,
    pub current_text_index: usize,
    pub is_in_choice:       bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub id:        Option<SaveId>,
    #[serde(rename = "type")]
    pub tier:      SaveTier,
    pub slot:      Option<u32>,
    pub name:      String,
    pub timestamp: Millis,
    /// Kept raw so loading can tell which template keys the save predates.
    pub game_data: Value,
}

impl SaveRecord {
    pub fn new(
        tier: SaveTier,
        slot: Option<u32>,
        name: impl Into<String>,
        timestamp: Millis,
        game_data: Value,
    ) -> Self {
        Self {
            id: None,
            tier,
            slot,
            name: name.into(),
            timestamp,
            game_data,
        }
    }

    /// Player health, when present. Used by summaries and tests.
    pub fn player_health(&self) -> Option<i64> {
        self.game_data
            .pointer("/player/stats/health")
            .and_then(Value::as_i64)
    }
}

/// Forensic log row. Append-only; never used for rollback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationLogEntry {
    #[serde(default)]
    pub id:        Option<i64>,
    pub action:    String,
    pub details:   String,
    pub timestamp: Millis,
    pub success:   bool,
}

impl MigrationLogEntry {
    pub fn new(
        action: &str,
        details: impl Into<String>,
        timestamp: Millis,
        success: bool,
    ) -> Self {
        Self {
            id: None,
            action: action.to_string(),
            details: details.into(),
            timestamp,
            success,
        }
    }
}

/// Stable `action` values written to the migration log.
pub mod log_action {
    pub const SCHEMA_MIGRATION:  &str = "schema_migration";
    pub const LEGACY_MIGRATION:  &str = "legacy_migration";
    pub const CAPTURE_DEGRADED:  &str = "snapshot_capture_degraded";
    pub const RESTORE_DEGRADED:  &str = "collaborator_restore_failed";
    pub const AUTO_SAVE_FAILED:  &str = "auto_save_failed";
    pub const SAVE_FAILED:       &str = "save_failed";
    pub const CORRUPT_RECORD:    &str = "corrupt_record";
    pub const LOAD_FAILED:       &str = "load_failed";
    pub const QUICK_EVICTION:    &str = "quick_slot_eviction";
    pub const FALLBACK_MIGRATION: &str = "fallback_migration";
}

/// The single current-session row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentGameState {
    pub session_id:     SessionId,
    pub last_save_id:   Option<SaveId>,
    pub last_save_type: Option<SaveTier>,
    pub updated_at:     Millis,
}

/// A snapshot is usable only if it carries a time block and a player
/// stats block. Anything less is treated as absent, never applied.
pub fn validate_snapshot(value: &Value) -> Result<(), String> {
    let tree = StateTree::from(value.clone());
    if !tree.is_branch() {
        return Err("snapshot is not an object".into());
    }
    if !tree.get("time").is_some_and(StateTree::is_branch) {
        return Err("missing time block".into());
    }
    let stats = tree.get("player").and_then(|p| p.get("stats"));
    if !stats.is_some_and(StateTree::is_branch) {
        return Err("missing player.stats block".into());
    }
    Ok(())
}
