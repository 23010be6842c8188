//! The canonical world-state tree.
//!
//! This is the default template every loaded snapshot is merged onto.
//! New fields get a default here; old saves that lack them pick the
//! default up through the merge, so the template structs carry no
//! `#[serde(default)]`. Map entries (NPCs, relationships) have no template
//! entry to merge onto, so those record types default per field instead.

use crate::{clock::GameTime, snapshot::PendingSceneData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    pub time:          GameTime,
    pub environment:   Environment,
    pub player:        Player,
    pub npcs:          BTreeMap<String, NpcRecord>,
    pub story:         Story,
    pub economy:       EconomyState,
    pub relationships: BTreeMap<String, RelationshipRecord>,
    pub map_state:     MapState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub weather:     String,
    pub season:      Season,
    pub temperature: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            weather:     "sunny".into(),
            season:      Season::Spring,
            temperature: 18.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name:      String,
    pub position:  Position,
    pub stats:     PlayerStats,
    pub inventory: Vec<InventoryItem>,
    pub skills:    BTreeMap<String, u32>,
    pub visual:    Visual,
    pub journal:   Vec<JournalEntry>,
    pub settings:  PlayerSettings,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            name:      "Newcomer".into(),
            position:  Position::default(),
            stats:     PlayerStats::default(),
            inventory: vec![
                InventoryItem { item_id: "hoe".into(),           quantity: 1 },
                InventoryItem { item_id: "watering_can".into(),  quantity: 1 },
                InventoryItem { item_id: "turnip_seeds".into(),  quantity: 5 },
            ],
            skills:    BTreeMap::new(),
            visual:    Visual::default(),
            journal:   Vec::new(),
            settings:  PlayerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub area: String,
    pub x:    i32,
    pub y:    i32,
}

impl Default for Position {
    fn default() -> Self {
        Self { area: "farmhouse".into(), x: 0, y: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub health:     i64,
    pub max_health: i64,
    pub stamina:    i64,
    /// Added in snapshot version 2.
    pub spirit:     i64,
    pub mood:       i64,
    pub money:      i64,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            health:     100,
            max_health: 100,
            stamina:    100,
            spirit:     50,
            mood:       60,
            money:      500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub item_id:  String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visual {
    pub portrait: String,
    pub outfit:   String,
}

impl Default for Visual {
    fn default() -> Self {
        Self { portrait: "default".into(), outfit: "work_clothes".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub day:  u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSettings {
    pub text_speed:   u32,
    pub auto_advance: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self { text_speed: 40, auto_advance: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NpcRecord {
    pub name:     String,
    pub location: String,
    pub mood:     i64,
    pub met:      bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub main_quest:       String,
    pub current_scene_id: Option<String>,
    pub decisions:        Vec<Decision>,
    pub flags:            BTreeMap<String, bool>,
    pub pending_scene:    Option<PendingSceneData>,
}

impl Default for Story {
    fn default() -> Self {
        Self {
            main_quest:       "settle_in".into(),
            current_scene_id: None,
            decisions:        Vec::new(),
            flags:            BTreeMap::new(),
            pending_scene:    None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub scene_id:  String,
    pub choice_id: String,
    pub day:       u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EconomyState {
    pub price_index:     f64,
    pub last_market_day: u32,
    pub debt:            i64,
}

impl Default for EconomyState {
    fn default() -> Self {
        Self { price_index: 1.0, last_market_day: 0, debt: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipRecord {
    pub affinity: i64,
    pub status:   String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapState {
    pub current_area: String,
    pub discovered:   Vec<String>,
}

impl Default for MapState {
    fn default() -> Self {
        Self {
            current_area: "farmhouse".into(),
            discovered:   vec!["farmhouse".into(), "village_square".into()],
        }
    }
}
