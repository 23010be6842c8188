//! Legacy flat-save migration tests.
//!
//! Tests cover: bare and wrapped legacy snapshots, key removal only after
//! a confirmed write, rejection of unusable strings, newer auto saves
//! surviving an import, migration at session build, and recovery of a
//! save written while running on the fallback store.

mod common;

use common::{count_actions, full_world, FlakyStore, T0};
use lifesim_core::{
    backend::SaveBackend,
    clock::ManualClock,
    config::{SaveConfig, DEFAULT_FALLBACK_QUOTA_BYTES, DEFAULT_LEGACY_KEY},
    fallback::{FlatStore, FALLBACK_CURRENT_KEY, FALLBACK_LOG_KEY, FALLBACK_SAVE_KEY},
    migration::{migrate_fallback_save, migrate_legacy_save, LegacyOutcome, MIGRATED_SAVE_NAME},
    resume::BootstrapOutcome,
    session::GameSession,
    snapshot::{log_action, MigrationLogEntry, SaveRecord},
    types::SaveTier,
};
use serde_json::json;

fn legacy_snapshot(health: i64) -> String {
    let mut world = full_world(5);
    world.state_mut().player.stats.health = health;
    world.snapshot().to_value().unwrap().to_string()
}

fn flat_with(value: &str) -> FlatStore {
    let mut flat = FlatStore::in_memory(DEFAULT_FALLBACK_QUOTA_BYTES);
    flat.set_item(DEFAULT_LEGACY_KEY, value).unwrap();
    flat
}

#[test]
fn nothing_to_migrate() {
    let store = FlakyStore::new();
    let mut flat = FlatStore::in_memory(DEFAULT_FALLBACK_QUOTA_BYTES);

    let outcome = migrate_legacy_save(&mut flat, &store, DEFAULT_LEGACY_KEY, T0).unwrap();

    assert_eq!(outcome, LegacyOutcome::NotPresent);
    assert!(store.list(None).unwrap().is_empty());
    assert_eq!(count_actions(&store, log_action::LEGACY_MIGRATION), 0);
}

#[test]
fn bare_snapshot_becomes_the_auto_save() {
    let store = FlakyStore::new();
    let mut flat = flat_with(&legacy_snapshot(64));

    let outcome = migrate_legacy_save(&mut flat, &store, DEFAULT_LEGACY_KEY, T0).unwrap();
    let LegacyOutcome::Migrated { id } = outcome else {
        panic!("expected a migration, got {outcome:?}");
    };

    let record = store.read(id).unwrap().expect("migrated record");
    assert_eq!(record.tier, SaveTier::Auto);
    assert_eq!(record.slot, Some(0));
    assert_eq!(record.name, MIGRATED_SAVE_NAME);
    assert_eq!(record.timestamp, T0);
    assert_eq!(record.player_health(), Some(64));

    assert!(flat.get_item(DEFAULT_LEGACY_KEY).is_none(), "key removed after the write");
    let log = store.migration_log().unwrap();
    let entry = log
        .iter()
        .find(|e| e.action == log_action::LEGACY_MIGRATION)
        .expect("migration logged");
    assert!(entry.success);
}

#[test]
fn wrapped_snapshot_keeps_its_timestamp() {
    let store = FlakyStore::new();
    let game_data: serde_json::Value = serde_json::from_str(&legacy_snapshot(12)).unwrap();
    let wrapped = json!({ "gameData": game_data, "timestamp": T0 - 86_400_000 }).to_string();
    let mut flat = flat_with(&wrapped);

    let outcome = migrate_legacy_save(&mut flat, &store, DEFAULT_LEGACY_KEY, T0).unwrap();
    let LegacyOutcome::Migrated { id } = outcome else {
        panic!("expected a migration, got {outcome:?}");
    };

    let record = store.read(id).unwrap().unwrap();
    assert_eq!(record.timestamp, T0 - 86_400_000);
    assert_eq!(record.player_health(), Some(12));
}

#[test]
fn failed_write_keeps_the_legacy_key() {
    let store = FlakyStore::new();
    store.fail_writes(true);
    let legacy = legacy_snapshot(50);
    let mut flat = flat_with(&legacy);

    assert!(migrate_legacy_save(&mut flat, &store, DEFAULT_LEGACY_KEY, T0).is_err());
    assert_eq!(flat.get_item(DEFAULT_LEGACY_KEY), Some(legacy.as_str()));
    assert!(store.list(None).unwrap().is_empty());

    let log = store.migration_log().unwrap();
    assert!(log
        .iter()
        .any(|e| e.action == log_action::LEGACY_MIGRATION && !e.success));

    // Next start, storage healthy again: the same key migrates.
    store.fail_writes(false);
    let retry = migrate_legacy_save(&mut flat, &store, DEFAULT_LEGACY_KEY, T0 + 1).unwrap();
    assert!(matches!(retry, LegacyOutcome::Migrated { .. }));
    assert!(flat.get_item(DEFAULT_LEGACY_KEY).is_none());
}

#[test]
fn unusable_strings_are_rejected_and_kept() {
    for raw in ["{not json", r#"{"time":{},"player":{}}"#, r#"{"gameData":[1,2,3]}"#] {
        let store = FlakyStore::new();
        let mut flat = flat_with(raw);

        let outcome = migrate_legacy_save(&mut flat, &store, DEFAULT_LEGACY_KEY, T0).unwrap();

        assert!(
            matches!(outcome, LegacyOutcome::Rejected { .. }),
            "{raw} should be rejected, got {outcome:?}"
        );
        assert_eq!(flat.get_item(DEFAULT_LEGACY_KEY), Some(raw));
        assert!(store.list(None).unwrap().is_empty());
        assert_eq!(count_actions(&store, log_action::LEGACY_MIGRATION), 1);
    }
}

#[test]
fn session_build_migrates_and_continues_from_the_legacy_save() {
    let flat_path =
        std::env::temp_dir().join(format!("lifesim-legacy-{}.json", uuid::Uuid::new_v4()));
    {
        let mut flat = FlatStore::open(&flat_path, DEFAULT_FALLBACK_QUOTA_BYTES).unwrap();
        flat.set_item(DEFAULT_LEGACY_KEY, &legacy_snapshot(27)).unwrap();
    }
    let config = SaveConfig {
        fallback_path: Some(flat_path.to_string_lossy().to_string()),
        ..SaveConfig::default_test()
    };
    let clock = ManualClock::starting_at(T0);

    let mut game = GameSession::build(config, Box::new(clock), 5).unwrap();

    let Some(LegacyOutcome::Migrated { id }) = game.legacy_outcome().cloned() else {
        panic!("expected the legacy save to migrate");
    };
    assert_eq!(game.continue_game(), BootstrapOutcome::Resumed { save_id: id });
    assert_eq!(game.world().state().player.stats.health, 27);

    let reopened = FlatStore::open(&flat_path, DEFAULT_FALLBACK_QUOTA_BYTES).unwrap();
    assert!(reopened.get_item(DEFAULT_LEGACY_KEY).is_none());

    let _ = std::fs::remove_file(&flat_path);
}

fn auto_save_with_health(store: &FlakyStore, health: i64, timestamp: i64) -> i64 {
    let game_data: serde_json::Value = serde_json::from_str(&legacy_snapshot(health)).unwrap();
    let record = SaveRecord::new(SaveTier::Auto, Some(0), "Autosave", timestamp, game_data);
    store.write(&record).unwrap()
}

#[test]
fn newer_auto_save_is_not_overwritten_by_a_bare_snapshot() {
    let store = FlakyStore::new();
    let occupant = auto_save_with_health(&store, 90, T0 + 1_000);
    let mut flat = flat_with(&legacy_snapshot(27));

    let outcome = migrate_legacy_save(&mut flat, &store, DEFAULT_LEGACY_KEY, T0 + 5_000).unwrap();
    let LegacyOutcome::Migrated { id } = outcome else {
        panic!("expected a migration, got {outcome:?}");
    };
    assert_ne!(id, occupant);

    let kept = store.read(occupant).unwrap().expect("occupant survives");
    assert_eq!(kept.slot, Some(0));
    assert_eq!(kept.player_health(), Some(90));

    let migrated = store.read(id).unwrap().unwrap();
    assert_eq!(migrated.slot, None);
    assert_eq!(migrated.player_health(), Some(27));
    assert!(migrated.timestamp < kept.timestamp, "undated snapshot ranks behind");

    let newest = &store.list(None).unwrap()[0];
    assert_eq!(newest.id, Some(occupant));
    assert!(flat.get_item(DEFAULT_LEGACY_KEY).is_none());
}

#[test]
fn dated_snapshot_replaces_an_older_auto_save() {
    let store = FlakyStore::new();
    let occupant = auto_save_with_health(&store, 90, T0 - 86_400_000);
    let game_data: serde_json::Value = serde_json::from_str(&legacy_snapshot(27)).unwrap();
    let wrapped = json!({ "gameData": game_data, "timestamp": T0 }).to_string();
    let mut flat = flat_with(&wrapped);

    let outcome = migrate_legacy_save(&mut flat, &store, DEFAULT_LEGACY_KEY, T0 + 5_000).unwrap();

    assert_eq!(outcome, LegacyOutcome::Migrated { id: occupant });
    let autos = store.list(Some(SaveTier::Auto)).unwrap();
    assert_eq!(autos.len(), 1);
    assert_eq!(autos[0].player_health(), Some(27));
}

#[test]
fn fallback_save_is_recovered_once_the_database_opens() {
    let flat_path =
        std::env::temp_dir().join(format!("lifesim-recover-{}.json", uuid::Uuid::new_v4()));
    let fallback_path = Some(flat_path.to_string_lossy().to_string());
    let clock = ManualClock::starting_at(T0);

    {
        let degraded = SaveConfig {
            db_path: std::env::temp_dir()
                .join(format!("lifesim-absent-{}", uuid::Uuid::new_v4()))
                .join("saves.db")
                .to_string_lossy()
                .to_string(),
            fallback_path: fallback_path.clone(),
            ..SaveConfig::default_test()
        };
        let mut game = GameSession::build(degraded, Box::new(clock.clone()), 5).unwrap();
        game.continue_game();
        game.world_mut().state_mut().player.stats.health = 33;
        game.manual_save("on the road").unwrap();
        game.store()
            .append_log(&MigrationLogEntry::new(log_action::SAVE_FAILED, "while degraded", T0, false))
            .unwrap();
    }

    clock.advance(60_000);
    let healthy = SaveConfig { fallback_path, ..SaveConfig::default_test() };
    let mut game = GameSession::build(healthy, Box::new(clock.clone()), 5).unwrap();

    let Some(LegacyOutcome::Migrated { id }) = game.fallback_outcome().cloned() else {
        panic!("expected the fallback save to be recovered");
    };
    let record = game.store().read(id).unwrap().expect("recovered record");
    assert_eq!(record.tier, SaveTier::Manual);
    assert_eq!(record.name, "on the road");

    let log = game.store().migration_log().unwrap();
    assert!(log.iter().any(|e| e.details == "while degraded"), "fallback log carried over");
    assert!(log
        .iter()
        .any(|e| e.action == log_action::FALLBACK_MIGRATION && e.success));

    assert_eq!(game.continue_game(), BootstrapOutcome::Resumed { save_id: id });
    assert_eq!(game.world().state().player.stats.health, 33);

    let reopened = FlatStore::open(&flat_path, DEFAULT_FALLBACK_QUOTA_BYTES).unwrap();
    for key in [FALLBACK_SAVE_KEY, FALLBACK_LOG_KEY, FALLBACK_CURRENT_KEY] {
        assert!(reopened.get_item(key).is_none(), "{key} removed after the import");
    }

    let _ = std::fs::remove_file(&flat_path);
}

#[test]
fn failed_fallback_import_keeps_every_key() {
    let store = FlakyStore::new();
    let game_data: serde_json::Value = serde_json::from_str(&legacy_snapshot(33)).unwrap();
    let mut record = SaveRecord::new(SaveTier::Manual, Some(0), "on the road", T0, game_data);
    record.id = Some(1);
    let raw = serde_json::to_string(&record).unwrap();
    let mut flat = FlatStore::in_memory(DEFAULT_FALLBACK_QUOTA_BYTES);
    flat.set_item(FALLBACK_SAVE_KEY, &raw).unwrap();

    store.fail_writes(true);
    assert!(migrate_fallback_save(&mut flat, &store, T0).is_err());
    assert_eq!(flat.get_item(FALLBACK_SAVE_KEY), Some(raw.as_str()));
    assert!(store.list(None).unwrap().is_empty());

    store.fail_writes(false);
    let retry = migrate_fallback_save(&mut flat, &store, T0 + 1).unwrap();
    assert!(matches!(retry, LegacyOutcome::Migrated { .. }));
    assert!(flat.get_item(FALLBACK_SAVE_KEY).is_none());
}

#[test]
fn fallback_import_never_overwrites_a_manual_save() {
    let store = FlakyStore::new();
    let game_data: serde_json::Value = serde_json::from_str(&legacy_snapshot(80)).unwrap();
    let existing = store
        .write(&SaveRecord::new(SaveTier::Manual, Some(0), "home", T0, game_data.clone()))
        .unwrap();
    let imported = SaveRecord::new(SaveTier::Manual, Some(0), "on the road", T0 + 10, game_data);
    let mut flat = FlatStore::in_memory(DEFAULT_FALLBACK_QUOTA_BYTES);
    flat.set_item(FALLBACK_SAVE_KEY, &serde_json::to_string(&imported).unwrap()).unwrap();

    let outcome = migrate_fallback_save(&mut flat, &store, T0 + 20).unwrap();
    let LegacyOutcome::Migrated { id } = outcome else {
        panic!("expected a migration, got {outcome:?}");
    };

    assert_ne!(id, existing);
    assert_eq!(store.read(existing).unwrap().unwrap().name, "home");
    assert_eq!(store.read(id).unwrap().unwrap().slot, None);
}
