//! Save orchestrator — decides when, where and under which tier to save.
//!
//! RULES:
//!   - Nothing is saved while `is_restoring` is set. Skips are silent.
//!   - Auto and quick saves are coalesced: a trigger inside the cooldown
//!     window after the last *completed* save of that tier is dropped.
//!   - Manual saves have no cooldown.
//!   - Auto failures never reach the player. Quick and manual failures
//!     return `Err` and queue a `Notice::SaveFailed`.
//!   - Every failure is written to the migration log, best effort.

use crate::{
    aggregator::WorldStateAggregator,
    backend::{append_or_warn, SaveBackend},
    clock::WallClock,
    config::SaveConfig,
    error::SaveResult,
    snapshot::{log_action, CurrentGameState, MigrationLogEntry, SaveRecord},
    types::{Millis, SaveId, SaveTier, SessionId},
};
use std::collections::HashMap;

pub const AUTO_SAVE_SLOT: u32 = 0;
pub const AUTO_SAVE_NAME: &str = "Auto Save";

/// What caused an auto-save attempt. Logged only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoTrigger {
    Interval,
    SceneTransition,
    Requested,
}

impl AutoTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Interval        => "interval",
            Self::SceneTransition => "scene_transition",
            Self::Requested       => "requested",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A load is in progress.
    Restoring,
    /// A save of the same tier completed inside the cooldown window.
    Cooldown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved { id: SaveId, tier: SaveTier, slot: Option<u32> },
    Skipped(SkipReason),
    /// Auto tier only; quick and manual failures are `Err`.
    Failed { message: String },
}

impl SaveOutcome {
    pub fn saved_id(&self) -> Option<SaveId> {
        match self {
            Self::Saved { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Messages for the presentation layer, drained with `take_notices`.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Saved { tier: SaveTier, id: SaveId, name: String },
    SaveFailed { tier: SaveTier, message: String },
    /// Running on the flat fallback store: one save, no history.
    DegradedMode { reason: String },
    LoadFailed { message: String },
}

pub struct SaveOrchestrator {
    config:           SaveConfig,
    clock:            Box<dyn WallClock>,
    session_id:       SessionId,
    restoring:        bool,
    last_completed:   HashMap<SaveTier, Millis>,
    /// Game minute the interval is measured from. Set on first sight.
    last_auto_minute: Option<u64>,
    notices:          Vec<Notice>,
}

impl SaveOrchestrator {
    pub fn new(config: SaveConfig, clock: Box<dyn WallClock>, session_id: SessionId) -> Self {
        Self {
            config,
            clock,
            session_id,
            restoring:        false,
            last_completed:   HashMap::new(),
            last_auto_minute: None,
            notices:          Vec::new(),
        }
    }

    pub fn now(&self) -> Millis {
        self.clock.now_millis()
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // ── Reentrancy guard ───────────────────────────────────────

    pub fn begin_restore(&mut self) {
        self.restoring = true;
    }

    pub fn end_restore(&mut self) {
        self.restoring = false;
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Restart the auto-save interval from `minute`. Called after a load
    /// so the restored clock does not trigger an immediate save.
    pub fn reset_interval(&mut self, minute: u64) {
        self.last_auto_minute = Some(minute);
    }

    // ── Triggers ───────────────────────────────────────────────

    /// Auto-save if the game clock has moved a full interval since the
    /// last interval attempt. `None` when the interval has not elapsed.
    pub fn on_time_advanced(
        &mut self,
        store: &dyn SaveBackend,
        world: &WorldStateAggregator,
    ) -> Option<SaveOutcome> {
        let minute = world.state().time.total_minutes();
        let Some(last) = self.last_auto_minute else {
            self.last_auto_minute = Some(minute);
            return None;
        };
        let interval = self.config.autosave_interval_minutes.max(1);
        if minute < last + interval {
            return None;
        }
        if self.restoring {
            return Some(SaveOutcome::Skipped(SkipReason::Restoring));
        }
        self.last_auto_minute = Some(minute);
        Some(self.auto_save(store, world, AutoTrigger::Interval))
    }

    pub fn on_scene_transition(
        &mut self,
        store: &dyn SaveBackend,
        world: &WorldStateAggregator,
    ) -> Option<SaveOutcome> {
        if !self.config.autosave_on_scene_transition {
            return None;
        }
        Some(self.auto_save(store, world, AutoTrigger::SceneTransition))
    }

    // ── Tiers ──────────────────────────────────────────────────

    /// Auto tier: slot 0, overwritten in place. Never returns an error.
    pub fn auto_save(
        &mut self,
        store: &dyn SaveBackend,
        world: &WorldStateAggregator,
        trigger: AutoTrigger,
    ) -> SaveOutcome {
        if let Some(reason) = self.skip_reason(SaveTier::Auto) {
            log::debug!("auto-save ({}) skipped: {reason:?}", trigger.as_str());
            return SaveOutcome::Skipped(reason);
        }
        match self.persist(store, world, SaveTier::Auto, Some(AUTO_SAVE_SLOT), AUTO_SAVE_NAME) {
            Ok(id) => {
                log::debug!("auto-save ({}) written as {id}", trigger.as_str());
                SaveOutcome::Saved { id, tier: SaveTier::Auto, slot: Some(AUTO_SAVE_SLOT) }
            }
            Err(e) => {
                let message = e.to_string();
                self.record_failure(store, SaveTier::Auto, &message);
                SaveOutcome::Failed { message }
            }
        }
    }

    /// Quick tier: rotate through `quick_slot_count` slots, filling empty
    /// ones first and then overwriting the oldest.
    pub fn quick_save(
        &mut self,
        store: &dyn SaveBackend,
        world: &WorldStateAggregator,
    ) -> SaveResult<SaveOutcome> {
        if let Some(reason) = self.skip_reason(SaveTier::Quick) {
            log::debug!("quick-save skipped: {reason:?}");
            return Ok(SaveOutcome::Skipped(reason));
        }
        let result = self.quick_slot(store).and_then(|slot| {
            let name = format!("Quick Save {}", slot + 1);
            self.persist(store, world, SaveTier::Quick, Some(slot), &name)
                .map(|id| (id, slot, name))
        });
        match result {
            Ok((id, slot, name)) => {
                self.notices.push(Notice::Saved { tier: SaveTier::Quick, id, name });
                Ok(SaveOutcome::Saved { id, tier: SaveTier::Quick, slot: Some(slot) })
            }
            Err(e) => {
                self.record_failure(store, SaveTier::Quick, &e.to_string());
                Err(e)
            }
        }
    }

    /// Manual tier: a new named record every time.
    pub fn manual_save(
        &mut self,
        store: &dyn SaveBackend,
        world: &WorldStateAggregator,
        name: &str,
    ) -> SaveResult<SaveOutcome> {
        if let Some(reason) = self.skip_reason(SaveTier::Manual) {
            log::debug!("manual save '{name}' skipped: {reason:?}");
            return Ok(SaveOutcome::Skipped(reason));
        }
        let result = next_manual_slot(store)
            .and_then(|slot| {
                self.persist(store, world, SaveTier::Manual, Some(slot), name)
                    .map(|id| (id, slot))
            });
        match result {
            Ok((id, slot)) => {
                self.notices.push(Notice::Saved {
                    tier: SaveTier::Manual,
                    id,
                    name: name.to_string(),
                });
                Ok(SaveOutcome::Saved { id, tier: SaveTier::Manual, slot: Some(slot) })
            }
            Err(e) => {
                self.record_failure(store, SaveTier::Manual, &e.to_string());
                Err(e)
            }
        }
    }

    // ── Notices ────────────────────────────────────────────────

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ── Internals ──────────────────────────────────────────────

    fn skip_reason(&self, tier: SaveTier) -> Option<SkipReason> {
        if self.restoring {
            return Some(SkipReason::Restoring);
        }
        if tier == SaveTier::Manual {
            return None;
        }
        let now = self.now();
        let cooling = self
            .last_completed
            .get(&tier)
            .is_some_and(|last| now - last < self.config.save_cooldown_ms);
        cooling.then_some(SkipReason::Cooldown)
    }

    /// Capture, write, then record diagnostics and the session pointer.
    /// Only the write itself can fail the save.
    fn persist(
        &mut self,
        store: &dyn SaveBackend,
        world: &WorldStateAggregator,
        tier: SaveTier,
        slot: Option<u32>,
        name: &str,
    ) -> SaveResult<SaveId> {
        let capture = world.get_full_snapshot();
        let now = self.now();
        let record = SaveRecord::new(tier, slot, name, now, capture.snapshot.to_value()?);
        let id = store.write(&record)?;
        self.last_completed.insert(tier, self.now());

        for degraded in &capture.degraded {
            append_or_warn(
                store,
                MigrationLogEntry::new(
                    log_action::CAPTURE_DEGRADED,
                    format!("save {id}: '{}' stored by identity: {}", degraded.key, degraded.reason),
                    now,
                    false,
                ),
            );
        }

        let pointer = CurrentGameState {
            session_id:     self.session_id.clone(),
            last_save_id:   Some(id),
            last_save_type: Some(tier),
            updated_at:     now,
        };
        if let Err(e) = store.put_current_state(&pointer) {
            log::warn!("current game state not updated after save {id}: {e}");
        }
        Ok(id)
    }

    /// Pick the quick slot to write, evicting records outside the ring.
    fn quick_slot(&self, store: &dyn SaveBackend) -> SaveResult<u32> {
        let count = self.config.quick_slot_count.max(1);
        let mut occupied: Vec<(u32, Millis)> = Vec::new();

        for record in store.list(Some(SaveTier::Quick))? {
            match record.slot {
                Some(slot) if slot < count => occupied.push((slot, record.timestamp)),
                _ => {
                    let Some(id) = record.id else { continue };
                    store.remove(id)?;
                    log::info!("evicted quick save {id} (slot {:?})", record.slot);
                    append_or_warn(
                        store,
                        MigrationLogEntry::new(
                            log_action::QUICK_EVICTION,
                            format!("quick save {id} at slot {:?} outside 0..{count}", record.slot),
                            self.now(),
                            true,
                        ),
                    );
                }
            }
        }

        if let Some(free) = (0..count).find(|s| occupied.iter().all(|(o, _)| o != s)) {
            return Ok(free);
        }
        let oldest = occupied
            .iter()
            .min_by_key(|(slot, timestamp)| (*timestamp, *slot))
            .map_or(0, |(slot, _)| *slot);
        Ok(oldest)
    }

    fn record_failure(&mut self, store: &dyn SaveBackend, tier: SaveTier, message: &str) {
        log::warn!("{tier} save failed: {message}");
        let action = if tier == SaveTier::Auto {
            log_action::AUTO_SAVE_FAILED
        } else {
            log_action::SAVE_FAILED
        };
        append_or_warn(
            store,
            MigrationLogEntry::new(action, format!("{tier}: {message}"), self.now(), false),
        );
        if tier.failure_is_user_visible() {
            self.notices.push(Notice::SaveFailed { tier, message: message.to_string() });
        }
    }
}

/// One past the highest manual slot ever allocated, so a row that no
/// longer reads back still keeps its slot.
fn next_manual_slot(store: &dyn SaveBackend) -> SaveResult<u32> {
    Ok(store.max_slot(SaveTier::Manual)?.map_or(0, |m| m + 1))
}
