//! Flat-store imports into the transactional store.
//!
//! Two sources share the flat store:
//!   - the legacy key, where builds before the transactional store kept
//!     one JSON snapshot string;
//!   - the fallback keys, written by sessions that ran without SQLite.
//!
//! RULES:
//!   - A flat key is removed only after the write that replaces it is
//!     confirmed. A rejected or failed import leaves it in place.
//!   - An import never overwrites a record that is as new or newer, and
//!     never overwrites a manual save. It is stored without a slot instead.

use crate::{
    backend::{append_or_warn, SaveBackend},
    error::SaveResult,
    fallback::{FlatStore, FALLBACK_CURRENT_KEY, FALLBACK_LOG_KEY, FALLBACK_SAVE_KEY},
    snapshot::{log_action, validate_snapshot, CurrentGameState, MigrationLogEntry, SaveRecord},
    types::{Millis, SaveId, SaveTier},
};
use serde_json::Value;

pub const MIGRATED_SAVE_NAME: &str = "Migrated save";

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyOutcome {
    NotPresent,
    Migrated { id: SaveId },
    /// The flat value is not a usable snapshot. Nothing was written.
    Rejected { reason: String },
}

/// Move the legacy save under `legacy_key` into `store`.
///
/// Returns `Err` only if the store write fails; the legacy key is kept.
pub fn migrate_legacy_save(
    flat: &mut FlatStore,
    store: &dyn SaveBackend,
    legacy_key: &str,
    now: Millis,
) -> SaveResult<LegacyOutcome> {
    let Some(raw) = flat.get_item(legacy_key).map(str::to_string) else {
        return Ok(LegacyOutcome::NotPresent);
    };

    let (game_data, timestamp) = match unwrap_legacy(&raw) {
        Ok(parsed) => parsed,
        Err(reason) => {
            return Ok(reject(store, log_action::LEGACY_MIGRATION, legacy_key, reason, now));
        }
    };

    let mut record = SaveRecord::new(
        SaveTier::Auto,
        Some(0),
        MIGRATED_SAVE_NAME,
        timestamp.unwrap_or(now),
        game_data,
    );
    let id = match place_and_write(store, &mut record, timestamp.is_some()) {
        Ok(id) => id,
        Err(e) => {
            append_or_warn(
                store,
                MigrationLogEntry::new(
                    log_action::LEGACY_MIGRATION,
                    format!("key '{legacy_key}' write failed, key kept: {e}"),
                    now,
                    false,
                ),
            );
            return Err(e);
        }
    };

    remove_or_warn(flat, legacy_key);
    append_or_warn(
        store,
        MigrationLogEntry::new(
            log_action::LEGACY_MIGRATION,
            format!(
                "key '{legacy_key}' migrated to save {id} slot {:?} ({} bytes)",
                record.slot,
                raw.len()
            ),
            now,
            true,
        ),
    );
    log::info!("legacy save migrated to record {id}");
    Ok(LegacyOutcome::Migrated { id })
}

/// Move the record, log and session pointer a fallback-mode session left
/// in the flat store into `store`.
///
/// The log is carried over even when there is no record. Returns `Err`
/// only if the record write fails; every fallback key is kept.
pub fn migrate_fallback_save(
    flat: &mut FlatStore,
    store: &dyn SaveBackend,
    now: Millis,
) -> SaveResult<LegacyOutcome> {
    carry_over_log(flat, store);

    let Some(raw) = flat.get_item(FALLBACK_SAVE_KEY).map(str::to_string) else {
        return Ok(LegacyOutcome::NotPresent);
    };

    let parsed = serde_json::from_str::<SaveRecord>(&raw)
        .map_err(|e| format!("not a save record: {e}"))
        .and_then(|r| validate_snapshot(&r.game_data).map(|()| r));
    let mut record = match parsed {
        Ok(record) => record,
        Err(reason) => {
            return Ok(reject(store, log_action::FALLBACK_MIGRATION, FALLBACK_SAVE_KEY, reason, now));
        }
    };
    record.id = None;

    let id = match place_and_write(store, &mut record, true) {
        Ok(id) => id,
        Err(e) => {
            append_or_warn(
                store,
                MigrationLogEntry::new(
                    log_action::FALLBACK_MIGRATION,
                    format!("fallback save write failed, key kept: {e}"),
                    now,
                    false,
                ),
            );
            return Err(e);
        }
    };

    repoint_session(flat, store, id, &record);
    remove_or_warn(flat, FALLBACK_SAVE_KEY);
    remove_or_warn(flat, FALLBACK_CURRENT_KEY);
    append_or_warn(
        store,
        MigrationLogEntry::new(
            log_action::FALLBACK_MIGRATION,
            format!(
                "fallback {} save '{}' moved to save {id} slot {:?}",
                record.tier, record.name, record.slot
            ),
            now,
            true,
        ),
    );
    log::info!("fallback save recovered as record {id}");
    Ok(LegacyOutcome::Migrated { id })
}

/// Write an imported record without clobbering anything newer.
///
/// `age_known` is false for legacy strings that carried no timestamp;
/// those rank just behind whatever already holds the slot.
fn place_and_write(
    store: &dyn SaveBackend,
    record: &mut SaveRecord,
    age_known: bool,
) -> SaveResult<SaveId> {
    if let Some(slot) = record.slot {
        let occupant = store
            .list(Some(record.tier))?
            .into_iter()
            .find(|r| r.slot == Some(slot));
        if let Some(occupant) = occupant {
            if !age_known {
                record.timestamp = record.timestamp.min(occupant.timestamp - 1);
            }
            let newer = record.timestamp > occupant.timestamp;
            if record.tier == SaveTier::Manual || !newer {
                log::info!(
                    "{} slot {slot} holds save {:?}; importing without a slot",
                    record.tier,
                    occupant.id
                );
                record.slot = None;
            }
        }
    }
    store.write(record)
}

/// Point the session at the recovered record unless the store already
/// points at something more recent.
fn repoint_session(flat: &FlatStore, store: &dyn SaveBackend, id: SaveId, record: &SaveRecord) {
    let carried: Option<CurrentGameState> = flat
        .get_item(FALLBACK_CURRENT_KEY)
        .and_then(|raw| serde_json::from_str(raw).ok());
    let updated_at = carried.as_ref().map_or(record.timestamp, |c| c.updated_at);

    match store.current_state() {
        Ok(Some(existing)) if existing.updated_at > updated_at => return,
        Ok(_) => {}
        Err(e) => log::warn!("current game state unreadable, overwriting: {e}"),
    }

    let pointer = CurrentGameState {
        session_id:     carried.map(|c| c.session_id).unwrap_or_default(),
        last_save_id:   Some(id),
        last_save_type: Some(record.tier),
        updated_at,
    };
    if let Err(e) = store.put_current_state(&pointer) {
        log::warn!("could not point the session at recovered save {id}: {e}");
    }
}

/// Append the fallback log to the store's log, then drop the flat copy.
/// If any append fails the flat copy is kept and may repeat next start.
fn carry_over_log(flat: &mut FlatStore, store: &dyn SaveBackend) {
    let Some(raw) = flat.get_item(FALLBACK_LOG_KEY) else { return };
    let entries: Vec<MigrationLogEntry> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("fallback log unreadable, leaving it in place: {e}");
            return;
        }
    };

    let count = entries.len();
    for mut entry in entries {
        entry.id = None;
        if let Err(e) = store.append_log(&entry) {
            log::warn!("fallback log carry-over stopped: {e}");
            return;
        }
    }
    remove_or_warn(flat, FALLBACK_LOG_KEY);
    log::debug!("carried {count} fallback log entries over");
}

fn reject(
    store: &dyn SaveBackend,
    action: &str,
    key: &str,
    reason: String,
    now: Millis,
) -> LegacyOutcome {
    log::warn!("flat value under '{key}' rejected: {reason}");
    append_or_warn(
        store,
        MigrationLogEntry::new(action, format!("key '{key}' rejected: {reason}"), now, false),
    );
    LegacyOutcome::Rejected { reason }
}

fn remove_or_warn(flat: &mut FlatStore, key: &str) {
    if let Err(e) = flat.remove_item(key) {
        // The record is safe; the key is imported again next start and
        // lands without a slot.
        log::warn!("flat key '{key}' could not be removed: {e}");
    }
}

/// Accept either a bare snapshot or the `{ gameData, timestamp }` wrapper
/// some legacy builds wrote.
fn unwrap_legacy(raw: &str) -> Result<(Value, Option<Millis>), String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("not JSON: {e}"))?;
    let (game_data, timestamp) = match value.get("gameData") {
        Some(inner) => (
            inner.clone(),
            value.get("timestamp").and_then(Value::as_i64),
        ),
        None => (value, None),
    };
    validate_snapshot(&game_data)?;
    Ok((game_data, timestamp))
}
