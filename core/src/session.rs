//! Game session — owns and wires every persistence component.
//!
//! RULES:
//!   - One session owns exactly one backend, aggregator, orchestrator and
//!     resume controller. Nothing here is global.
//!   - Gameplay reaches the store only through the orchestrator (saves)
//!     and the resume controller (loads).
//!   - Loads of any kind go through the same two-phase resume path.

use crate::{
    aggregator::WorldStateAggregator,
    backend::{open_backend, BackendKind, OpenedBackend, SaveBackend},
    clock::{ManualClock, WallClock},
    collaborators::{
        register_defaults, EconomySystem, FarmingSystem, RelationshipSystem, WeatherSystem,
    },
    config::SaveConfig,
    error::{SaveError, SaveResult},
    migration::{migrate_fallback_save, migrate_legacy_save, LegacyOutcome},
    narrative::{BufferedTranscript, SceneNode, ScriptedNarrative},
    orchestrator::{AutoTrigger, Notice, SaveOrchestrator, SaveOutcome},
    resume::{BootstrapOutcome, BootstrapRequest, ResumeController, ResumeState},
    rng::RngBank,
    snapshot::{MigrationLogEntry, SaveRecord},
    types::{SaveId, SaveTier, SessionId},
};
use uuid::Uuid;

/// Scene a new game opens on.
pub const OPENING_SCENE: &str = "arrival";

pub struct GameSession {
    backend:      Box<dyn SaveBackend>,
    world:        WorldStateAggregator,
    orchestrator: SaveOrchestrator,
    resume:       ResumeController,
    session_id:   SessionId,
    legacy:       Option<LegacyOutcome>,
    /// Save left behind by an earlier session that ran on the fallback.
    recovered:    Option<LegacyOutcome>,
}

impl GameSession {
    /// Open storage, migrate any legacy save, and wire the reference
    /// collaborators, scene engine and transcript.
    ///
    /// Only a flat store that cannot be opened fails the build. A missing
    /// transactional store degrades to the fallback and queues a notice.
    pub fn build(config: SaveConfig, clock: Box<dyn WallClock>, world_seed: u64) -> SaveResult<Self> {
        let now = clock.now_millis();
        let mut world = WorldStateAggregator::new();
        register_defaults(&mut world, RngBank::new(world_seed))?;
        world.attach_scene_cursor(Box::new(ScriptedNarrative::new(opening_scenes())));
        world.attach_surface(Box::new(BufferedTranscript::default()));

        let opened = open_backend(&config)?;
        let request_durability = config.request_durability;
        let legacy_key = config.legacy_key.clone();
        let mut session = match opened {
            OpenedBackend::Transactional { store, mut flat } => {
                if request_durability && !store.request_durability() {
                    log::info!("durability not granted; saves may be evicted");
                }
                let legacy = match migrate_legacy_save(&mut flat, &store, &legacy_key, now) {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        log::warn!("legacy migration failed, key kept for next start: {e}");
                        None
                    }
                };
                let recovered = match migrate_fallback_save(&mut flat, &store, now) {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        log::warn!("fallback save not recovered, keys kept for next start: {e}");
                        None
                    }
                };
                let mut session = Self::from_parts(Box::new(store), world, config, clock);
                session.legacy = legacy;
                session.recovered = recovered;
                session
            }
            OpenedBackend::Fallback { backend, reason } => {
                let mut session = Self::from_parts(Box::new(backend), world, config, clock);
                session.orchestrator.push_notice(Notice::DegradedMode { reason });
                session
            }
        };
        log::info!(
            "session {} ready on {:?} backend",
            session.session_id,
            session.backend.kind()
        );
        Ok(session)
    }

    /// In-memory session for tests and tools.
    pub fn build_test(clock: ManualClock, world_seed: u64) -> SaveResult<Self> {
        Self::build(SaveConfig::default_test(), Box::new(clock), world_seed)
    }

    /// Wire a session around an already-open backend and a pre-built world.
    /// No legacy migration, no durability request.
    pub fn from_parts(
        backend: Box<dyn SaveBackend>,
        world: WorldStateAggregator,
        config: SaveConfig,
        clock: Box<dyn WallClock>,
    ) -> Self {
        let session_id = Uuid::new_v4().to_string();
        Self {
            backend,
            world,
            orchestrator: SaveOrchestrator::new(config, clock, session_id.clone()),
            resume:       ResumeController::new(),
            session_id,
            legacy:       None,
            recovered:    None,
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn world(&self) -> &WorldStateAggregator {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldStateAggregator {
        &mut self.world
    }

    pub fn store(&self) -> &dyn SaveBackend {
        self.backend.as_ref()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn resume_state(&self) -> ResumeState {
        self.resume.state()
    }

    pub fn is_restoring(&self) -> bool {
        self.orchestrator.is_restoring()
    }

    /// What happened to the legacy flat save at build time, if anything
    /// was attempted.
    pub fn legacy_outcome(&self) -> Option<&LegacyOutcome> {
        self.legacy.as_ref()
    }

    /// What happened to a save written in fallback mode by an earlier
    /// session, if the transactional store was available this time.
    pub fn fallback_outcome(&self) -> Option<&LegacyOutcome> {
        self.recovered.as_ref()
    }

    // ── Bootstrap / resume ─────────────────────────────────────

    /// Resume or start a game. Stops after Phase 1 when resuming; call
    /// `finish_presentation` once the display is ready.
    pub fn bootstrap(&mut self, request: BootstrapRequest) -> BootstrapOutcome {
        let outcome = self.resume.bootstrap(
            request,
            self.backend.as_ref(),
            &mut self.world,
            &mut self.orchestrator,
        );
        if let BootstrapOutcome::NewGame { .. } = outcome {
            self.open_new_game();
        }
        outcome
    }

    /// Bootstrap with `Continue` and run both resume phases.
    pub fn continue_game(&mut self) -> BootstrapOutcome {
        let outcome = self.bootstrap(BootstrapRequest::Continue);
        if let BootstrapOutcome::Resumed { .. } = outcome {
            self.finish_presentation();
        }
        outcome
    }

    pub fn finish_presentation(&mut self) -> bool {
        self.resume
            .finish_presentation(&mut self.world, &mut self.orchestrator)
    }

    /// Load a specific record through both resume phases. On failure the
    /// current game is kept and a `LoadFailed` notice is queued.
    pub fn load_save(&mut self, id: SaveId) -> SaveResult<SaveId> {
        let result = self
            .backend
            .read(id)
            .and_then(|record| record.ok_or(SaveError::SaveNotFound { id }))
            .and_then(|record| {
                self.resume.begin(
                    &record,
                    self.backend.as_ref(),
                    &mut self.world,
                    &mut self.orchestrator,
                )
            });
        match result {
            Ok(id) => {
                self.finish_presentation();
                Ok(id)
            }
            Err(e) => {
                self.orchestrator
                    .push_notice(Notice::LoadFailed { message: e.to_string() });
                Err(e)
            }
        }
    }

    /// Load the newest manual save called `name`.
    pub fn load_named(&mut self, name: &str) -> SaveResult<SaveId> {
        let id = self
            .backend
            .list(Some(SaveTier::Manual))?
            .into_iter()
            .find(|r| r.name == name)
            .and_then(|r| r.id)
            .ok_or_else(|| SaveError::NamedSaveNotFound { name: name.to_string() })?;
        self.load_save(id)
    }

    /// Load the newest quick save. `Ok(None)` if there is none.
    pub fn quick_load(&mut self) -> SaveResult<Option<SaveId>> {
        let newest = self
            .backend
            .list(Some(SaveTier::Quick))?
            .into_iter()
            .find_map(|r| r.id);
        match newest {
            Some(id) => self.load_save(id).map(Some),
            None => Ok(None),
        }
    }

    // ── Gameplay hooks ─────────────────────────────────────────

    /// Advance the game clock, run day-boundary collaborator updates, and
    /// give the auto-save interval a chance to fire.
    pub fn advance_time(&mut self, minutes: u64) -> Option<SaveOutcome> {
        let days_crossed = self.world.state_mut().time.advance_minutes(minutes);
        if days_crossed > 0 {
            let today = self.world.state().time.day;
            for day in today + 1 - days_crossed..=today {
                self.start_day(day);
            }
        }
        self.orchestrator
            .on_time_advanced(self.backend.as_ref(), &self.world)
    }

    /// Move the scripted narrative to `scene_id` through the normal
    /// pipeline, render it, and run the scene-transition auto-save.
    pub fn transition_scene(&mut self, scene_id: &str) -> SaveResult<Option<SaveOutcome>> {
        let entered = self
            .world
            .scene_as_mut::<ScriptedNarrative>()
            .and_then(|n| n.transition_to(scene_id));
        if entered.is_none() {
            return Err(SaveError::UnknownScene { id: scene_id.to_string() });
        }
        self.render_current_scene();
        Ok(self
            .orchestrator
            .on_scene_transition(self.backend.as_ref(), &self.world))
    }

    /// Enter a node built at runtime. It exists nowhere but in the cursor
    /// and, once saved, in the snapshot.
    pub fn enter_generated_scene(&mut self, node: SceneNode) -> Option<SaveOutcome> {
        let narrative = self.world.scene_as_mut::<ScriptedNarrative>()?;
        narrative.enter_generated(node);
        self.render_current_scene();
        self.orchestrator
            .on_scene_transition(self.backend.as_ref(), &self.world)
    }

    // ── Saves ──────────────────────────────────────────────────

    pub fn auto_save(&mut self) -> SaveOutcome {
        self.orchestrator
            .auto_save(self.backend.as_ref(), &self.world, AutoTrigger::Requested)
    }

    pub fn quick_save(&mut self) -> SaveResult<SaveOutcome> {
        self.orchestrator.quick_save(self.backend.as_ref(), &self.world)
    }

    pub fn manual_save(&mut self, name: &str) -> SaveResult<SaveOutcome> {
        self.orchestrator
            .manual_save(self.backend.as_ref(), &self.world, name)
    }

    pub fn delete_save(&mut self, id: SaveId) -> SaveResult<()> {
        self.backend.remove(id)?;
        log::info!("save {id} deleted");
        Ok(())
    }

    pub fn list_saves(&self, tier: Option<SaveTier>) -> SaveResult<Vec<SaveRecord>> {
        self.backend.list(tier)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.orchestrator.take_notices()
    }

    pub fn migration_log(&self) -> SaveResult<Vec<MigrationLogEntry>> {
        self.backend.migration_log()
    }

    // ── Internals ──────────────────────────────────────────────

    fn open_new_game(&mut self) {
        if let Some(surface) = self.world.surface_mut() {
            surface.replay("");
        }
        if let Some(narrative) = self.world.scene_as_mut::<ScriptedNarrative>() {
            narrative.transition_to(OPENING_SCENE);
        }
        self.render_current_scene();
    }

    fn start_day(&mut self, day: u32) {
        let season = self.world.state().environment.season;
        let weather = self
            .world
            .collaborator_mut::<WeatherSystem>()
            .map(|w| w.roll_for_day(day, season));
        if let Some(kind) = weather {
            self.world.state_mut().environment.weather = kind.as_str().to_string();
        }

        let drift = self.world.collaborator_mut::<EconomySystem>().map(|e| {
            e.open_market(day);
            e.ledger.market_drift
        });
        if let Some(drift) = drift {
            let economy = &mut self.world.state_mut().economy;
            economy.price_index = drift;
            economy.last_market_day = day;
        }

        if let Some(farming) = self.world.collaborator_mut::<FarmingSystem>() {
            farming.grow_overnight();
        }
        if let Some(relationships) = self.world.collaborator_mut::<RelationshipSystem>() {
            relationships.new_day();
        }
        log::debug!("day {day} started");
    }

    fn render_current_scene(&mut self) {
        let Some(node) = self
            .world
            .scene_as::<ScriptedNarrative>()
            .and_then(|n| n.current().cloned())
        else {
            return;
        };
        self.world.state_mut().story.current_scene_id = Some(node.id.clone());
        if let Some(transcript) = self.world.surface_as_mut::<BufferedTranscript>() {
            for line in &node.text {
                transcript.push_line(&node.id, line);
            }
            transcript.push_choices(&node);
        }
    }
}

/// A few fixed scenes so a new game has somewhere to start.
fn opening_scenes() -> Vec<SceneNode> {
    vec![
        SceneNode::new(
            OPENING_SCENE,
            vec![
                "The bus leaves you at the end of a dirt road.".into(),
                "A weathered sign reads: Willowmere Farm.".into(),
            ],
        )
        .with_choice("enter_farmhouse", "Go inside", Some("farmhouse"))
        .with_choice("walk_to_village", "Walk to the village", Some("village_square")),
        SceneNode::new(
            "farmhouse",
            vec!["Dust hangs in the light. The stove still works.".into()],
        )
        .with_choice("sleep", "Rest for the night", None),
        SceneNode::new(
            "village_square",
            vec!["The mayor waves from the fountain.".into()],
        )
        .with_choice("greet_mayor", "Say hello", None),
        SceneNode::new(
            "forest_clearing",
            vec!["Something large moves between the trees.".into()],
        )
        .with_choice("fight", "Stand your ground", None)
        .with_choice("run", "Run back", Some("farmhouse")),
    ]
}
