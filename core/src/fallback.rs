//! Flat fallback store.
//!
//! A synchronous, string-only key/value map with a byte quota, optionally
//! backed by one JSON file. Used as the save backend when SQLite cannot
//! be opened, and as the source for legacy flat saves.
//!
//! As a save backend it holds at most one record: every write replaces it.

use crate::{
    backend::{BackendKind, SaveBackend},
    error::{SaveError, SaveResult},
    snapshot::{CurrentGameState, MigrationLogEntry, SaveRecord},
    types::{SaveId, SaveTier},
};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub const FALLBACK_SAVE_KEY:    &str = "lifesim_fallback_save";
pub const FALLBACK_LOG_KEY:     &str = "lifesim_fallback_log";
pub const FALLBACK_CURRENT_KEY: &str = "lifesim_fallback_current";

/// Oldest log entries are dropped past this many.
pub const FALLBACK_LOG_CAP: usize = 200;

/// The fallback backend's single record always has this id.
pub const FALLBACK_RECORD_ID: SaveId = 1;

pub struct FlatStore {
    items: BTreeMap<String, String>,
    quota: usize,
    path:  Option<PathBuf>,
}

impl FlatStore {
    pub fn in_memory(quota: usize) -> Self {
        Self { items: BTreeMap::new(), quota, path: None }
    }

    /// Load the map from `path` if it exists. An unreadable file is
    /// logged and treated as empty; it is overwritten on the next write.
    pub fn open(path: impl AsRef<Path>, quota: usize) -> SaveResult<Self> {
        let path = path.as_ref().to_path_buf();
        let items = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            match serde_json::from_str(&raw) {
                Ok(items) => items,
                Err(e) => {
                    log::warn!("flat store {} unreadable, starting empty: {e}", path.display());
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { items, quota, path: Some(path) })
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Store `value` under `key`. Fails with QuotaExceeded, leaving the
    /// previous value in place, if the store would grow past its quota.
    pub fn set_item(&mut self, key: &str, value: &str) -> SaveResult<()> {
        let current = self.used_bytes();
        let replaced = self.items.get(key).map_or(0, |v| key.len() + v.len());
        let needed = current - replaced + key.len() + value.len();
        if needed > self.quota {
            return Err(SaveError::QuotaExceeded { needed, quota: self.quota });
        }

        let previous = self.items.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist() {
            match previous {
                Some(old) => self.items.insert(key.to_string(), old),
                None => self.items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    pub fn remove_item(&mut self, key: &str) -> SaveResult<()> {
        if let Some(previous) = self.items.remove(key) {
            if let Err(e) = self.persist() {
                self.items.insert(key.to_string(), previous);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Bytes counted against the quota: keys plus values.
    pub fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn persist(&self) -> SaveResult<()> {
        let Some(path) = &self.path else { return Ok(()) };
        let json = serde_json::to_string(&self.items)?;
        // Write to a temp file first, then rename for atomicity.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Reduced-fidelity save backend over a FlatStore.
pub struct FallbackBackend {
    flat: RefCell<FlatStore>,
}

impl FallbackBackend {
    pub fn new(flat: FlatStore) -> Self {
        Self { flat: RefCell::new(flat) }
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> SaveResult<Option<T>> {
        let flat = self.flat.borrow();
        flat.get_item(key)
            .map(|raw| serde_json::from_str::<T>(raw))
            .transpose()
            .map_err(SaveError::from)
    }

    fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) -> SaveResult<()> {
        let raw = serde_json::to_string(value)?;
        self.flat.borrow_mut().set_item(key, &raw)
    }
}

impl SaveBackend for FallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn write(&self, record: &SaveRecord) -> SaveResult<SaveId> {
        let mut stored = record.clone();
        stored.id = Some(FALLBACK_RECORD_ID);
        self.write_json(FALLBACK_SAVE_KEY, &stored)?;
        Ok(FALLBACK_RECORD_ID)
    }

    fn read(&self, id: SaveId) -> SaveResult<Option<SaveRecord>> {
        if id != FALLBACK_RECORD_ID {
            return Ok(None);
        }
        self.read_json(FALLBACK_SAVE_KEY).map_err(|e| SaveError::CorruptRecord {
            id,
            reason: e.to_string(),
        })
    }

    fn list(&self, tier: Option<SaveTier>) -> SaveResult<Vec<SaveRecord>> {
        let record = match self.read(FALLBACK_RECORD_ID) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("skipping unreadable fallback save: {e}");
                None
            }
        };
        Ok(record
            .into_iter()
            .filter(|r| tier.is_none_or(|t| r.tier == t))
            .collect())
    }

    fn remove(&self, id: SaveId) -> SaveResult<()> {
        if id == FALLBACK_RECORD_ID {
            self.flat.borrow_mut().remove_item(FALLBACK_SAVE_KEY)?;
        }
        Ok(())
    }

    fn max_slot(&self, tier: SaveTier) -> SaveResult<Option<u32>> {
        Ok(self.list(Some(tier))?.into_iter().find_map(|r| r.slot))
    }

    fn request_durability(&self) -> bool {
        false
    }

    fn append_log(&self, entry: &MigrationLogEntry) -> SaveResult<()> {
        let mut entries: Vec<MigrationLogEntry> =
            self.read_json(FALLBACK_LOG_KEY)?.unwrap_or_default();
        let next_id = entries.last().and_then(|e| e.id).unwrap_or(0) + 1;
        let mut entry = entry.clone();
        entry.id = Some(next_id);
        entries.push(entry);
        if entries.len() > FALLBACK_LOG_CAP {
            entries.drain(..entries.len() - FALLBACK_LOG_CAP);
        }
        self.write_json(FALLBACK_LOG_KEY, &entries)
    }

    fn migration_log(&self) -> SaveResult<Vec<MigrationLogEntry>> {
        Ok(self.read_json(FALLBACK_LOG_KEY)?.unwrap_or_default())
    }

    fn put_current_state(&self, state: &CurrentGameState) -> SaveResult<()> {
        self.write_json(FALLBACK_CURRENT_KEY, state)
    }

    fn current_state(&self) -> SaveResult<Option<CurrentGameState>> {
        self.read_json(FALLBACK_CURRENT_KEY)
    }
}
