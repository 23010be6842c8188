use crate::{
    error::SaveResult,
    rng::{CollaboratorSlot, RngBank},
    subsystem::{capture_state, restore_state, Snapshottable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enemy {
    pub id: String,
    pub hp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CombatState {
    pub enemy:     Option<Enemy>,
    pub turn:      u32,
    pub victories: u32,
}

pub struct CombatSystem {
    pub state: CombatState,
    bank:      RngBank,
}

impl CombatSystem {
    pub fn new(bank: RngBank) -> Self {
        Self { state: CombatState::default(), bank }
    }

    pub fn in_encounter(&self) -> bool {
        self.state.enemy.is_some()
    }

    pub fn start_encounter(&mut self, enemy_id: &str, hp: i64) {
        self.state.enemy = Some(Enemy { id: enemy_id.to_string(), hp });
        self.state.turn = 0;
    }

    /// One player strike on `day`. Returns damage dealt.
    pub fn strike(&mut self, day: u32, power: i64) -> i64 {
        let Some(enemy) = self.state.enemy.as_mut() else { return 0 };
        self.state.turn += 1;
        let mut rng = self.bank.for_day(CollaboratorSlot::Combat, day.wrapping_add(self.state.turn));
        let damage = if rng.chance(0.1) { power * 2 } else { power };
        enemy.hp -= damage;
        if enemy.hp <= 0 {
            self.state.enemy = None;
            self.state.victories += 1;
        }
        damage
    }

    pub fn flee(&mut self) {
        self.state.enemy = None;
        self.state.turn = 0;
    }
}

impl Snapshottable for CombatSystem {
    fn key(&self) -> &'static str { "combat" }

    fn capture(&self) -> SaveResult<Value> {
        capture_state(&self.state)
    }

    fn restore(&mut self, data: Option<&Value>) -> SaveResult<()> {
        restore_state(&mut self.state, data)
    }

    fn reset(&mut self) {
        self.state = CombatState::default();
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
