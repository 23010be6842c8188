use crate::{
    error::SaveResult,
    subsystem::{capture_state, restore_state, Snapshottable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    any::Any,
    collections::{BTreeMap, BTreeSet},
};

pub const MAX_AFFINITY: i64 = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipState {
    pub affinity:    BTreeMap<String, i64>,
    pub gifts_today: BTreeSet<String>,
}

#[derive(Default)]
pub struct RelationshipSystem {
    pub state: RelationshipState,
}

impl RelationshipSystem {
    /// One gift per NPC per day. Returns false if already gifted today.
    pub fn give_gift(&mut self, npc_id: &str, delta: i64) -> bool {
        if !self.state.gifts_today.insert(npc_id.to_string()) {
            return false;
        }
        let entry = self.state.affinity.entry(npc_id.to_string()).or_insert(0);
        *entry = (*entry + delta).clamp(-MAX_AFFINITY, MAX_AFFINITY);
        true
    }

    pub fn new_day(&mut self) {
        self.state.gifts_today.clear();
    }

    pub fn affinity(&self, npc_id: &str) -> i64 {
        self.state.affinity.get(npc_id).copied().unwrap_or(0)
    }
}

impl Snapshottable for RelationshipSystem {
    fn key(&self) -> &'static str { "relationships" }

    fn capture(&self) -> SaveResult<Value> {
        capture_state(&self.state)
    }

    fn restore(&mut self, data: Option<&Value>) -> SaveResult<()> {
        restore_state(&mut self.state, data)
    }

    fn reset(&mut self) {
        self.state = RelationshipState::default();
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
