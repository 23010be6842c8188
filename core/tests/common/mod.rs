//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use lifesim_core::{
    aggregator::WorldStateAggregator,
    backend::{BackendKind, SaveBackend},
    collaborators::register_defaults,
    error::{SaveError, SaveResult},
    narrative::{BufferedTranscript, SceneNode, ScriptedNarrative},
    rng::RngBank,
    snapshot::{CurrentGameState, MigrationLogEntry, SaveRecord},
    store::SaveStore,
    types::{SaveId, SaveTier},
};
use std::{cell::Cell, rc::Rc};

pub const T0: i64 = 1_700_000_000_000;

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory SaveStore whose writes can be made to fail. Clones share
/// the same store and switch, so a test keeps one handle while the code
/// under test owns another.
#[derive(Clone)]
pub struct FlakyStore {
    inner:       Rc<SaveStore>,
    fail_writes: Rc<Cell<bool>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner:       Rc::new(SaveStore::init(":memory:").expect("in-memory store")),
            fail_writes: Rc::new(Cell::new(false)),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn store(&self) -> &SaveStore {
        &self.inner
    }
}

impl SaveBackend for FlakyStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Transactional
    }

    fn write(&self, record: &SaveRecord) -> SaveResult<SaveId> {
        if self.fail_writes.get() {
            return Err(SaveError::QuotaExceeded { needed: 1 << 30, quota: 1 << 20 });
        }
        self.inner.write_save(record)
    }

    fn read(&self, id: SaveId) -> SaveResult<Option<SaveRecord>> {
        self.inner.read_save(id)
    }

    fn list(&self, tier: Option<SaveTier>) -> SaveResult<Vec<SaveRecord>> {
        self.inner.list_saves(tier)
    }

    fn remove(&self, id: SaveId) -> SaveResult<()> {
        self.inner.remove_save(id)
    }

    fn max_slot(&self, tier: SaveTier) -> SaveResult<Option<u32>> {
        self.inner.max_slot(tier)
    }

    fn request_durability(&self) -> bool {
        false
    }

    fn append_log(&self, entry: &MigrationLogEntry) -> SaveResult<()> {
        self.inner.append_log(entry)
    }

    fn migration_log(&self) -> SaveResult<Vec<MigrationLogEntry>> {
        self.inner.migration_log()
    }

    fn put_current_state(&self, state: &CurrentGameState) -> SaveResult<()> {
        self.inner.put_current_state(state)
    }

    fn current_state(&self) -> SaveResult<Option<CurrentGameState>> {
        self.inner.current_state()
    }
}

/// Default collaborators, a small scene graph, and a transcript surface.
pub fn full_world(seed: u64) -> WorldStateAggregator {
    let mut world = WorldStateAggregator::new();
    register_defaults(&mut world, RngBank::new(seed)).expect("register collaborators");
    world.attach_scene_cursor(Box::new(ScriptedNarrative::new(scenes())));
    world.attach_surface(Box::new(BufferedTranscript::default()));
    world
}

pub fn scenes() -> Vec<SceneNode> {
    vec![
        SceneNode::new("arrival", vec!["You arrive.".into()])
            .with_choice("go_in", "Go inside", Some("farmhouse")),
        SceneNode::new("farmhouse", vec!["Dusty.".into(), "Quiet.".into()])
            .with_choice("sleep", "Sleep", None),
        SceneNode::new("boss_gate", vec!["A shadow blocks the bridge.".into()])
            .with_choice("fight", "Fight", None)
            .with_choice("run", "Run", Some("farmhouse")),
    ]
}

pub fn count_actions(store: &dyn SaveBackend, action: &str) -> usize {
    store
        .migration_log()
        .expect("read migration log")
        .iter()
        .filter(|e| e.action == action)
        .count()
}
