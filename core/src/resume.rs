//! Bootstrap and resume controller.
//!
//! STATE MACHINE:
//!   Start -> CheckingStore -> Restoring -> AwaitingPresentation -> Ready
//!   Start -> NewGame                         (new game requested)
//!   CheckingStore -> NewGame                 (no save, or no save loads)
//!
//! Phase 1 (`begin`) puts data in place: world state, collaborators and
//! the scene cursor. Phase 2 (`finish_presentation`) replays the
//! transcript and re-attaches choice handlers. The reentrancy guard is
//! held from the start of Phase 1 until the end of Phase 2.
//!
//! RULE: the scene is entered with `load_node_directly` (inside the
//! aggregator load), never through the normal transition path, so no
//! enter effects fire twice.

use crate::{
    aggregator::WorldStateAggregator,
    backend::{append_or_warn, SaveBackend},
    error::{SaveError, SaveResult},
    orchestrator::SaveOrchestrator,
    snapshot::{log_action, validate_snapshot, MigrationLogEntry, SaveRecord},
    types::SaveId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeState {
    Start,
    CheckingStore,
    Restoring,
    AwaitingPresentation { save_id: SaveId },
    Ready { save_id: SaveId },
    NewGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapRequest {
    Continue,
    NewGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewGameReason {
    Requested,
    NoSave,
    /// Saves exist but none of them could be loaded.
    InvalidSave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Phase 1 is done; call `finish_presentation` to complete.
    Resumed { save_id: SaveId },
    NewGame { reason: NewGameReason },
    /// This session already loaded or started a game. Nothing was done.
    AlreadyLoaded,
}

pub struct ResumeController {
    state:  ResumeState,
    loaded: bool,
}

impl Default for ResumeController {
    fn default() -> Self {
        Self::new()
    }
}

impl ResumeController {
    pub fn new() -> Self {
        Self { state: ResumeState::Start, loaded: false }
    }

    pub fn state(&self) -> ResumeState {
        self.state
    }

    pub fn has_loaded(&self) -> bool {
        self.loaded
    }

    /// Start the session: resume the best save, or begin a new game.
    /// Idempotent per session.
    pub fn bootstrap(
        &mut self,
        request: BootstrapRequest,
        store: &dyn SaveBackend,
        world: &mut WorldStateAggregator,
        orchestrator: &mut SaveOrchestrator,
    ) -> BootstrapOutcome {
        if self.loaded {
            log::debug!("bootstrap ignored: session already loaded");
            return BootstrapOutcome::AlreadyLoaded;
        }
        if request == BootstrapRequest::NewGame {
            return self.start_new_game(world, orchestrator, NewGameReason::Requested);
        }

        self.state = ResumeState::CheckingStore;
        let (candidates, rejected) = candidates(store, orchestrator.now());
        let tried = candidates.len();

        for record in candidates {
            match self.begin(&record, store, world, orchestrator) {
                Ok(save_id) => return BootstrapOutcome::Resumed { save_id },
                Err(e) => {
                    log::warn!("resume from save {:?} failed: {e}", record.id);
                    self.state = ResumeState::CheckingStore;
                }
            }
        }

        let reason = if tried + rejected == 0 {
            NewGameReason::NoSave
        } else {
            NewGameReason::InvalidSave
        };
        self.start_new_game(world, orchestrator, reason)
    }

    /// Phase 1: load `record` into the world and position the scene
    /// cursor. Leaves the guard set; the state becomes
    /// `AwaitingPresentation`.
    ///
    /// On failure the world is untouched, the guard is cleared and the
    /// controller returns to its previous state.
    pub fn begin(
        &mut self,
        record: &SaveRecord,
        store: &dyn SaveBackend,
        world: &mut WorldStateAggregator,
        orchestrator: &mut SaveOrchestrator,
    ) -> SaveResult<SaveId> {
        let save_id = record.id.unwrap_or_default();
        let previous = self.state;
        orchestrator.begin_restore();
        self.state = ResumeState::Restoring;

        let degraded = match world.load_full_snapshot(&record.game_data) {
            Ok(degraded) => degraded,
            Err(e) => {
                let e = match e {
                    SaveError::CorruptRecord { reason, .. } => {
                        SaveError::CorruptRecord { id: save_id, reason }
                    }
                    other => other,
                };
                append_or_warn(
                    store,
                    MigrationLogEntry::new(
                        log_action::LOAD_FAILED,
                        format!("save {save_id}: {e}"),
                        orchestrator.now(),
                        false,
                    ),
                );
                orchestrator.end_restore();
                self.state = previous;
                return Err(e);
            }
        };

        for d in &degraded {
            append_or_warn(
                store,
                MigrationLogEntry::new(
                    log_action::RESTORE_DEGRADED,
                    format!("save {save_id}: '{}' kept defaults: {}", d.key, d.reason),
                    orchestrator.now(),
                    false,
                ),
            );
        }

        orchestrator.reset_interval(world.state().time.total_minutes());
        self.loaded = true;
        self.state = ResumeState::AwaitingPresentation { save_id };
        log::info!("save {save_id} ({}) restored, awaiting presentation", record.tier);
        Ok(save_id)
    }

    /// Phase 2: replay the transcript verbatim, re-attach choice handlers,
    /// then release the guard. Returns false if no Phase 1 is pending.
    pub fn finish_presentation(
        &mut self,
        world: &mut WorldStateAggregator,
        orchestrator: &mut SaveOrchestrator,
    ) -> bool {
        let ResumeState::AwaitingPresentation { save_id } = self.state else {
            return false;
        };

        if let Some(handlers) = world.present_transcript() {
            log::debug!("re-attached {handlers} choice handlers");
        }

        orchestrator.end_restore();
        self.state = ResumeState::Ready { save_id };
        true
    }

    fn start_new_game(
        &mut self,
        world: &mut WorldStateAggregator,
        orchestrator: &mut SaveOrchestrator,
        reason: NewGameReason,
    ) -> BootstrapOutcome {
        world.reset();
        orchestrator.end_restore();
        orchestrator.reset_interval(world.state().time.total_minutes());
        self.loaded = true;
        self.state = ResumeState::NewGame;
        log::info!("starting new game ({reason:?})");
        BootstrapOutcome::NewGame { reason }
    }
}

/// Resume candidates in preference order: the session pointer's record,
/// then every other record newest first. Structurally invalid records are
/// logged and counted, not returned.
fn candidates(store: &dyn SaveBackend, now: i64) -> (Vec<SaveRecord>, usize) {
    let mut ordered: Vec<SaveRecord> = Vec::new();
    let mut rejected = 0;

    let mut reject = |id: Option<SaveId>, reason: &str| {
        log::warn!("skipping save {id:?}: {reason}");
        append_or_warn(
            store,
            MigrationLogEntry::new(
                log_action::CORRUPT_RECORD,
                format!("save {id:?}: {reason}"),
                now,
                false,
            ),
        );
        rejected += 1;
    };

    let pointer_id = match store.current_state() {
        Ok(state) => state.and_then(|s| s.last_save_id),
        Err(e) => {
            log::warn!("current game state unreadable: {e}");
            None
        }
    };
    if let Some(id) = pointer_id {
        match store.read(id) {
            Ok(Some(record)) => ordered.push(record),
            Ok(None) => log::debug!("current game state points at missing save {id}"),
            Err(e) => reject(Some(id), &e.to_string()),
        }
    }

    match store.list(None) {
        Ok(records) => {
            ordered.extend(records.into_iter().filter(|r| r.id != pointer_id || r.id.is_none()))
        }
        Err(e) => log::warn!("save listing failed, nothing to resume: {e}"),
    }

    let mut valid = Vec::with_capacity(ordered.len());
    for record in ordered {
        match validate_snapshot(&record.game_data) {
            Ok(()) => valid.push(record),
            Err(reason) => reject(record.id, &reason),
        }
    }
    (valid, rejected)
}
