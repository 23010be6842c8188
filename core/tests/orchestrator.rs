//! Save orchestrator tests.
//!
//! Tests cover: cooldown coalescing, the reentrancy guard, quick-slot
//! rotation and eviction, manual slot allocation, failure visibility per
//! tier, interval and scene-transition triggers.

mod common;

use common::{count_actions, full_world, FlakyStore, T0};
use lifesim_core::{
    aggregator::WorldStateAggregator,
    backend::SaveBackend,
    clock::ManualClock,
    config::SaveConfig,
    error::{SaveError, SaveResult},
    orchestrator::{AutoTrigger, Notice, SaveOrchestrator, SaveOutcome, SkipReason},
    snapshot::{log_action, SaveRecord},
    subsystem::Snapshottable,
    types::SaveTier,
};
use serde_json::{json, Value};
use std::any::Any;

fn setup(config: SaveConfig) -> (SaveOrchestrator, ManualClock, FlakyStore, WorldStateAggregator) {
    let clock = ManualClock::starting_at(T0);
    let orchestrator = SaveOrchestrator::new(config, Box::new(clock.clone()), "test-session".into());
    (orchestrator, clock, FlakyStore::new(), full_world(1))
}

fn default_setup() -> (SaveOrchestrator, ManualClock, FlakyStore, WorldStateAggregator) {
    setup(SaveConfig::default_test())
}

#[test]
fn auto_saves_inside_cooldown_are_coalesced() {
    let (mut orch, clock, store, world) = default_setup();

    let first = orch.auto_save(&store, &world, AutoTrigger::Requested);
    assert!(matches!(first, SaveOutcome::Saved { tier: SaveTier::Auto, slot: Some(0), .. }));

    clock.advance(2_999);
    let second = orch.auto_save(&store, &world, AutoTrigger::SceneTransition);
    assert_eq!(second, SaveOutcome::Skipped(SkipReason::Cooldown));

    clock.advance(1);
    let third = orch.auto_save(&store, &world, AutoTrigger::Requested);
    assert_eq!(third.saved_id(), first.saved_id(), "auto slot is overwritten in place");
    assert_eq!(store.store().save_count().unwrap(), 1);
}

#[test]
fn cooldown_is_per_tier() {
    let (mut orch, _clock, store, world) = default_setup();

    orch.auto_save(&store, &world, AutoTrigger::Requested);
    let quick = orch.quick_save(&store, &world).unwrap();
    assert!(matches!(quick, SaveOutcome::Saved { tier: SaveTier::Quick, .. }));

    let quick_again = orch.quick_save(&store, &world).unwrap();
    assert_eq!(quick_again, SaveOutcome::Skipped(SkipReason::Cooldown));
}

#[test]
fn manual_saves_have_no_cooldown() {
    let (mut orch, _clock, store, world) = default_setup();

    for name in ["one", "two", "three"] {
        let outcome = orch.manual_save(&store, &world, name).unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { tier: SaveTier::Manual, .. }));
    }

    let slots: Vec<(Option<u32>, String)> = store
        .list(Some(SaveTier::Manual))
        .unwrap()
        .into_iter()
        .map(|r| (r.slot, r.name))
        .collect();
    assert_eq!(slots.len(), 3);
    assert!(slots.contains(&(Some(0), "one".to_string())));
    assert!(slots.contains(&(Some(2), "three".to_string())));
}

#[test]
fn unreadable_manual_save_keeps_its_slot() {
    let (mut orch, _clock, store, world) = default_setup();

    orch.manual_save(&store, &world, "zero").unwrap();
    let one = orch.manual_save(&store, &world, "one").unwrap().saved_id().unwrap();
    store.store().overwrite_raw_game_data(one, "{truncated").unwrap();
    assert_eq!(store.list(Some(SaveTier::Manual)).unwrap().len(), 1);

    let outcome = orch.manual_save(&store, &world, "two").unwrap();
    assert!(matches!(outcome, SaveOutcome::Saved { slot: Some(2), .. }));
    assert_ne!(outcome.saved_id(), Some(one));
    assert_eq!(store.store().save_count().unwrap(), 3, "unreadable row left alone");
}

#[test]
fn cooldown_starts_from_the_last_completed_save() {
    let (mut orch, _clock, store, world) = default_setup();

    store.fail_writes(true);
    assert!(matches!(
        orch.auto_save(&store, &world, AutoTrigger::Requested),
        SaveOutcome::Failed { .. }
    ));

    store.fail_writes(false);
    let retry = orch.auto_save(&store, &world, AutoTrigger::Requested);
    assert!(
        matches!(retry, SaveOutcome::Saved { .. }),
        "a failed save must not start the cooldown, got {retry:?}"
    );
}

#[test]
fn nothing_is_saved_while_restoring() {
    let (mut orch, _clock, store, world) = default_setup();
    orch.begin_restore();

    assert_eq!(
        orch.auto_save(&store, &world, AutoTrigger::Requested),
        SaveOutcome::Skipped(SkipReason::Restoring)
    );
    assert_eq!(
        orch.quick_save(&store, &world).unwrap(),
        SaveOutcome::Skipped(SkipReason::Restoring)
    );
    assert_eq!(
        orch.manual_save(&store, &world, "mid-load").unwrap(),
        SaveOutcome::Skipped(SkipReason::Restoring)
    );
    assert_eq!(store.store().save_count().unwrap(), 0);
    assert!(orch.take_notices().is_empty(), "skips are silent");

    orch.end_restore();
    assert!(matches!(
        orch.auto_save(&store, &world, AutoTrigger::Requested),
        SaveOutcome::Saved { .. }
    ));
}

#[test]
fn quick_saves_rotate_and_overwrite_the_oldest() {
    let (mut orch, clock, store, world) = default_setup();

    let mut slots = Vec::new();
    for _ in 0..5 {
        match orch.quick_save(&store, &world).unwrap() {
            SaveOutcome::Saved { slot, .. } => slots.push(slot.unwrap()),
            other => panic!("expected a quick save, got {other:?}"),
        }
        clock.advance(5_000);
    }

    assert_eq!(slots, vec![0, 1, 2, 0, 1]);
    assert_eq!(store.list(Some(SaveTier::Quick)).unwrap().len(), 3);
}

#[test]
fn quick_records_outside_the_ring_are_evicted() {
    let (mut orch, _clock, store, world) = default_setup();
    let stray = store
        .write(&SaveRecord::new(
            SaveTier::Quick,
            Some(7),
            "from a bigger ring",
            1,
            json!({ "time": {}, "player": { "stats": {} } }),
        ))
        .unwrap();

    orch.quick_save(&store, &world).unwrap();

    assert!(store.read(stray).unwrap().is_none());
    assert_eq!(count_actions(&store, log_action::QUICK_EVICTION), 1);
}

#[test]
fn auto_save_failure_is_silent_but_logged() {
    let (mut orch, _clock, store, world) = default_setup();
    store.fail_writes(true);

    let outcome = orch.auto_save(&store, &world, AutoTrigger::Interval);
    assert!(matches!(outcome, SaveOutcome::Failed { .. }));
    assert!(orch.take_notices().is_empty());
    assert_eq!(count_actions(&store, log_action::AUTO_SAVE_FAILED), 1);
}

#[test]
fn manual_save_failure_is_reported() {
    let (mut orch, _clock, store, world) = default_setup();
    store.fail_writes(true);

    let result = orch.manual_save(&store, &world, "doomed");
    assert!(matches!(result, Err(SaveError::QuotaExceeded { .. })));

    let notices = orch.take_notices();
    assert!(matches!(
        notices.as_slice(),
        [Notice::SaveFailed { tier: SaveTier::Manual, .. }]
    ));
    assert_eq!(count_actions(&store, log_action::SAVE_FAILED), 1);
}

#[test]
fn successful_saves_update_the_session_pointer_and_notify() {
    let (mut orch, _clock, store, world) = default_setup();
    let id = orch
        .manual_save(&store, &world, "checkpoint")
        .unwrap()
        .saved_id()
        .unwrap();

    let pointer = store.current_state().unwrap().expect("pointer written");
    assert_eq!(pointer.last_save_id, Some(id));
    assert_eq!(pointer.last_save_type, Some(SaveTier::Manual));
    assert_eq!(pointer.session_id, "test-session");
    assert_eq!(pointer.updated_at, T0);

    assert_eq!(
        orch.take_notices(),
        vec![Notice::Saved { tier: SaveTier::Manual, id, name: "checkpoint".into() }]
    );
}

#[test]
fn interval_trigger_fires_every_configured_game_minutes() {
    let (mut orch, clock, store, mut world) = default_setup();
    orch.reset_interval(world.state().time.total_minutes());

    world.state_mut().time.advance_minutes(20);
    assert_eq!(orch.on_time_advanced(&store, &world), None);

    world.state_mut().time.advance_minutes(10);
    let fired = orch.on_time_advanced(&store, &world);
    assert!(matches!(fired, Some(SaveOutcome::Saved { tier: SaveTier::Auto, .. })));

    clock.advance(10_000);
    world.state_mut().time.advance_minutes(29);
    assert_eq!(orch.on_time_advanced(&store, &world), None);
}

#[test]
fn scene_transition_trigger_respects_config() {
    let config = SaveConfig {
        autosave_on_scene_transition: false,
        ..SaveConfig::default_test()
    };
    let (mut orch, _clock, store, world) = setup(config);
    assert_eq!(orch.on_scene_transition(&store, &world), None);

    let (mut orch, _clock, store, world) = default_setup();
    assert!(matches!(
        orch.on_scene_transition(&store, &world),
        Some(SaveOutcome::Saved { .. })
    ));
}

struct Flaky;

impl Snapshottable for Flaky {
    fn key(&self) -> &'static str { "flaky" }

    fn capture(&self) -> SaveResult<Value> {
        Err(SaveError::SnapshotCaptureDegraded { key: "flaky".into(), reason: "busy".into() })
    }

    fn restore(&mut self, _data: Option<&Value>) -> SaveResult<()> { Ok(()) }
    fn reset(&mut self) {}
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

#[test]
fn degraded_capture_still_saves_and_is_logged() {
    let (mut orch, _clock, store, mut world) = default_setup();
    world.register(Box::new(Flaky)).unwrap();

    let outcome = orch.manual_save(&store, &world, "partial").unwrap();
    let id = outcome.saved_id().expect("save went through");

    let record = store.read(id).unwrap().unwrap();
    assert_eq!(record.game_data["subsystems"]["flaky"]["degraded"], json!(true));
    assert_eq!(count_actions(&store, log_action::CAPTURE_DEGRADED), 1);
}
