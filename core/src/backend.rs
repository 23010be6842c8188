//! The storage seam the orchestrator and resume controller depend on.
//!
//! Two implementations: SaveStore (SQLite, full fidelity) and
//! FallbackBackend (flat store, one record). `open_backend` decides which
//! one a session gets.

use crate::{
    config::SaveConfig,
    error::{SaveError, SaveResult},
    fallback::{FallbackBackend, FlatStore},
    snapshot::{CurrentGameState, MigrationLogEntry, SaveRecord},
    store::SaveStore,
    types::{SaveId, SaveTier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Transactional,
    Fallback,
}

/// Storage operations with no game semantics.
///
/// Not-found is never an error: `read` gives `None`, `list` gives an empty
/// vec, `remove` of a missing id succeeds. Write failures are returned,
/// never swallowed, and never retried.
pub trait SaveBackend {
    fn kind(&self) -> BackendKind;

    /// Overwrite-in-place on (tier, slot), insert otherwise. Returns the id.
    fn write(&self, record: &SaveRecord) -> SaveResult<SaveId>;
    fn read(&self, id: SaveId) -> SaveResult<Option<SaveRecord>>;
    /// Newest first.
    fn list(&self, tier: Option<SaveTier>) -> SaveResult<Vec<SaveRecord>>;
    fn remove(&self, id: SaveId) -> SaveResult<()>;
    /// Highest slot in use by `tier`, counting rows `list` skips.
    fn max_slot(&self, tier: SaveTier) -> SaveResult<Option<u32>>;

    /// Best-effort eviction protection. Never errors.
    fn request_durability(&self) -> bool;

    fn append_log(&self, entry: &MigrationLogEntry) -> SaveResult<()>;
    fn migration_log(&self) -> SaveResult<Vec<MigrationLogEntry>>;

    fn put_current_state(&self, state: &CurrentGameState) -> SaveResult<()>;
    fn current_state(&self) -> SaveResult<Option<CurrentGameState>>;
}

impl SaveBackend for SaveStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Transactional
    }

    fn write(&self, record: &SaveRecord) -> SaveResult<SaveId> {
        self.write_save(record)
    }

    fn read(&self, id: SaveId) -> SaveResult<Option<SaveRecord>> {
        self.read_save(id)
    }

    fn list(&self, tier: Option<SaveTier>) -> SaveResult<Vec<SaveRecord>> {
        self.list_saves(tier)
    }

    fn remove(&self, id: SaveId) -> SaveResult<()> {
        self.remove_save(id)
    }

    fn max_slot(&self, tier: SaveTier) -> SaveResult<Option<u32>> {
        SaveStore::max_slot(self, tier)
    }

    fn request_durability(&self) -> bool {
        SaveStore::request_durability(self)
    }

    fn append_log(&self, entry: &MigrationLogEntry) -> SaveResult<()> {
        SaveStore::append_log(self, entry)
    }

    fn migration_log(&self) -> SaveResult<Vec<MigrationLogEntry>> {
        SaveStore::migration_log(self)
    }

    fn put_current_state(&self, state: &CurrentGameState) -> SaveResult<()> {
        SaveStore::put_current_state(self, state)
    }

    fn current_state(&self) -> SaveResult<Option<CurrentGameState>> {
        SaveStore::current_state(self)
    }
}

/// Diagnostics are never allowed to fail the operation that produced them.
pub(crate) fn append_or_warn(store: &dyn SaveBackend, entry: MigrationLogEntry) {
    if let Err(e) = store.append_log(&entry) {
        log::warn!("migration log append failed ({}): {e}", entry.action);
    }
}

/// What `open_backend` produced.
pub enum OpenedBackend {
    /// SQLite is available. The flat store is kept as a legacy-migration
    /// source only.
    Transactional { store: SaveStore, flat: FlatStore },
    /// SQLite could not be opened; saves go to the flat store.
    Fallback { backend: FallbackBackend, reason: String },
}

/// Open the flat store, then try the transactional store. Only a failure
/// to open the flat store itself is an error.
pub fn open_backend(config: &SaveConfig) -> SaveResult<OpenedBackend> {
    let flat = match &config.fallback_path {
        Some(path) => FlatStore::open(path, config.fallback_quota_bytes)?,
        None => FlatStore::in_memory(config.fallback_quota_bytes),
    };

    match SaveStore::init(&config.db_path) {
        Ok(store) => Ok(OpenedBackend::Transactional { store, flat }),
        Err(e) => {
            // A file that opens but cannot be migrated is just as unusable.
            let reason = match e {
                SaveError::StoreUnavailable { reason } => reason,
                other => other.to_string(),
            };
            log::warn!("transactional store unavailable, using flat fallback: {reason}");
            Ok(OpenedBackend::Fallback {
                backend: FallbackBackend::new(flat),
                reason,
            })
        }
    }
}
