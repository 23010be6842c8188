//! Transactional store tests.
//!
//! Tests cover: slot uniqueness, not-found semantics, ordering, corrupt
//! rows, schema migrations, and the session/settings/provider tables.

use lifesim_core::{
    error::SaveError,
    snapshot::{log_action, CurrentGameState, SaveRecord},
    store::{ProviderConfig, SaveStore, SCHEMA_VERSION},
    types::SaveTier,
};
use serde_json::json;

fn store() -> SaveStore {
    SaveStore::init(":memory:").expect("in-memory store")
}

fn game_data(health: i64) -> serde_json::Value {
    json!({
        "version": 2,
        "time": { "day": 3, "hour": 9, "minute": 0, "weekday": "wednesday" },
        "player": { "stats": { "health": health } }
    })
}

#[test]
fn writing_same_tier_and_slot_updates_in_place() {
    let store = store();

    let first = store
        .write_save(&SaveRecord::new(SaveTier::Auto, Some(0), "Auto Save", 1_000, game_data(90)))
        .unwrap();
    let second = store
        .write_save(&SaveRecord::new(SaveTier::Auto, Some(0), "Auto Save", 2_000, game_data(40)))
        .unwrap();

    assert_eq!(first, second, "overwrite must keep the row id");
    assert_eq!(store.save_count().unwrap(), 1);

    let record = store.read_save(first).unwrap().expect("record exists");
    assert_eq!(record.player_health(), Some(40));
    assert_eq!(record.timestamp, 2_000);
}

#[test]
fn same_slot_in_different_tiers_are_distinct_records() {
    let store = store();
    let auto = store
        .write_save(&SaveRecord::new(SaveTier::Auto, Some(0), "a", 1, game_data(1)))
        .unwrap();
    let quick = store
        .write_save(&SaveRecord::new(SaveTier::Quick, Some(0), "q", 2, game_data(2)))
        .unwrap();
    assert_ne!(auto, quick);
    assert_eq!(store.save_count().unwrap(), 2);
}

#[test]
fn record_without_slot_always_inserts() {
    let store = store();
    let a = store
        .write_save(&SaveRecord::new(SaveTier::Manual, None, "same", 1, game_data(1)))
        .unwrap();
    let b = store
        .write_save(&SaveRecord::new(SaveTier::Manual, None, "same", 2, game_data(2)))
        .unwrap();
    assert_ne!(a, b);
}

#[test]
fn missing_records_are_not_errors() {
    let store = store();
    assert!(store.read_save(999).unwrap().is_none());
    assert!(store.list_saves(Some(SaveTier::Quick)).unwrap().is_empty());
    store.remove_save(999).expect("removing a missing id succeeds");
}

#[test]
fn remove_is_idempotent() {
    let store = store();
    let id = store
        .write_save(&SaveRecord::new(SaveTier::Manual, Some(0), "x", 1, game_data(1)))
        .unwrap();
    store.remove_save(id).unwrap();
    store.remove_save(id).unwrap();
    assert!(store.read_save(id).unwrap().is_none());
}

#[test]
fn list_is_newest_first_and_filters_by_tier() {
    let store = store();
    store.write_save(&SaveRecord::new(SaveTier::Manual, Some(0), "old", 100, game_data(1))).unwrap();
    store.write_save(&SaveRecord::new(SaveTier::Manual, Some(1), "new", 300, game_data(2))).unwrap();
    store.write_save(&SaveRecord::new(SaveTier::Auto, Some(0), "auto", 200, game_data(3))).unwrap();

    let manual: Vec<String> = store
        .list_saves(Some(SaveTier::Manual))
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(manual, vec!["new", "old"]);

    let all: Vec<String> = store.list_saves(None).unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(all, vec!["new", "auto", "old"]);
}

#[test]
fn corrupt_row_is_an_error_on_read_and_skipped_by_list() {
    let store = store();
    let good = store
        .write_save(&SaveRecord::new(SaveTier::Manual, Some(0), "good", 1, game_data(1)))
        .unwrap();
    let bad = store
        .write_save(&SaveRecord::new(SaveTier::Manual, Some(1), "bad", 2, game_data(2)))
        .unwrap();
    store.overwrite_raw_game_data(bad, "{not json").unwrap();

    match store.read_save(bad) {
        Err(SaveError::CorruptRecord { id, .. }) => assert_eq!(id, bad),
        other => panic!("expected CorruptRecord, got {other:?}"),
    }

    let listed = store.list_saves(None).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, Some(good));
}

#[test]
fn migrations_apply_once_and_are_logged() {
    let store = store();
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);

    let applied_again = store.migrate().unwrap();
    assert_eq!(applied_again, 0, "re-running migrate must be a no-op");

    let schema_entries = store
        .migration_log()
        .unwrap()
        .into_iter()
        .filter(|e| e.action == log_action::SCHEMA_MIGRATION)
        .count();
    assert_eq!(schema_entries, SCHEMA_VERSION as usize);
}

#[test]
fn in_memory_store_reports_no_durability() {
    assert!(!store().request_durability());
}

#[test]
fn file_store_is_reopened_with_its_records() {
    let path = std::env::temp_dir().join(format!("lifesim-store-{}.db", uuid::Uuid::new_v4()));
    let path_str = path.to_string_lossy().to_string();

    let id = {
        let store = SaveStore::init(&path_str).unwrap();
        assert!(store.request_durability());
        store
            .write_save(&SaveRecord::new(SaveTier::Manual, Some(0), "kept", 5, game_data(77)))
            .unwrap()
    };

    let reopened = SaveStore::init(&path_str).unwrap();
    assert_eq!(reopened.migrate().unwrap(), 0);
    let record = reopened.read_save(id).unwrap().expect("record survives reopen");
    assert_eq!(record.name, "kept");
    assert_eq!(record.player_health(), Some(77));

    drop(reopened);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn unopenable_path_is_store_unavailable() {
    let path = std::env::temp_dir()
        .join(format!("lifesim-missing-{}", uuid::Uuid::new_v4()))
        .join("nested")
        .join("saves.db");
    match SaveStore::open(&path.to_string_lossy()) {
        Err(SaveError::StoreUnavailable { .. }) => {}
        Err(other) => panic!("expected StoreUnavailable, got {other}"),
        Ok(_) => panic!("opening inside a missing directory should fail"),
    }
}

#[test]
fn current_game_state_is_a_single_row() {
    let store = store();
    assert!(store.current_state().unwrap().is_none());

    for (id, tier) in [(1, SaveTier::Auto), (2, SaveTier::Manual)] {
        store
            .put_current_state(&CurrentGameState {
                session_id:     "s-1".into(),
                last_save_id:   Some(id),
                last_save_type: Some(tier),
                updated_at:     id * 10,
            })
            .unwrap();
    }

    let current = store.current_state().unwrap().expect("row present");
    assert_eq!(current.last_save_id, Some(2));
    assert_eq!(current.last_save_type, Some(SaveTier::Manual));
}

#[test]
fn settings_round_trip_json_values() {
    let store = store();
    assert!(store.setting("text_speed").unwrap().is_none());

    store.set_setting("text_speed", &json!(2), 1).unwrap();
    store.set_setting("text_speed", &json!(3), 2).unwrap();
    store.set_setting("volume", &json!({ "music": 0.4 }), 3).unwrap();

    assert_eq!(store.setting("text_speed").unwrap(), Some(json!(3)));
    assert_eq!(store.setting("volume").unwrap(), Some(json!({ "music": 0.4 })));
}

#[test]
fn provider_config_upsert_and_remove() {
    let store = store();
    let mut config = ProviderConfig {
        service:    "dialogue".into(),
        endpoint:   "http://localhost:8080".into(),
        api_key:    "key-1".into(),
        model:      "small".into(),
        updated_at: 1,
    };
    store.upsert_provider_config(&config).unwrap();
    config.model = "large".into();
    config.updated_at = 2;
    store.upsert_provider_config(&config).unwrap();

    let configs = store.provider_configs().unwrap();
    assert_eq!(configs, vec![config]);

    store.remove_provider_config("dialogue").unwrap();
    assert!(store.provider_configs().unwrap().is_empty());
}
