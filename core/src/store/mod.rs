//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Nothing above this layer executes SQL or knows table names.
//! Every write either commits or returns an error; nothing is retried here.

use crate::{
    error::{SaveError, SaveResult},
    snapshot::{log_action, MigrationLogEntry},
};
use rusqlite::{Connection, OpenFlags};

mod migration_log;
mod saves;
mod session;

pub use session::ProviderConfig;

/// Ordered schema migrations. The index + 1 is the schema version the
/// migration brings the database to. Append only.
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_saves",          include_str!("../../../migrations/001_saves.sql")),
    ("002_session_tables", include_str!("../../../migrations/002_session_tables.sql")),
];

pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

pub struct SaveStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SaveStore {
    /// Open (or create) the save database at `path`.
    /// Any failure to open is StoreUnavailable: the caller falls back to
    /// the flat store.
    pub fn open(path: &str) -> SaveResult<Self> {
        if path == ":memory:" {
            return Self::in_memory();
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| SaveError::StoreUnavailable {
            reason: format!("cannot open {path}: {e}"),
        })?;
        // WAL mode only matters for real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SaveResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| SaveError::StoreUnavailable {
            reason: format!("cannot open in-memory database: {e}"),
        })?;
        Ok(Self { conn, path: None })
    }

    /// Open and bring the schema up to date in one step.
    pub fn init(path: &str) -> SaveResult<Self> {
        let store = Self::open(path)?;
        store.migrate()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> SaveResult<u32> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version as u32)
    }

    /// Apply pending schema migrations in order. Each one runs in its own
    /// transaction together with its user_version bump and log entry.
    /// Returns the number applied.
    pub fn migrate(&self) -> SaveResult<usize> {
        let current = self.schema_version()?;
        let mut applied = 0;

        for (index, (name, sql)) in MIGRATIONS.iter().enumerate() {
            let version = index as u32 + 1;
            if version <= current {
                continue;
            }
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", version)?;
            Self::insert_log(
                &tx,
                &MigrationLogEntry::new(
                    log_action::SCHEMA_MIGRATION,
                    format!("applied {name} (schema v{current} -> v{version})"),
                    chrono::Utc::now().timestamp_millis(),
                    true,
                ),
            )?;
            tx.commit()?;
            log::info!("schema migration {name} applied");
            applied += 1;
        }
        Ok(applied)
    }

    /// Best-effort request that the database survive crashes and eviction.
    /// Never errors.
    pub fn request_durability(&self) -> bool {
        if self.path.is_none() {
            return false;
        }
        match self.conn.pragma_update(None, "synchronous", "FULL") {
            Ok(()) => true,
            Err(e) => {
                log::warn!("durability request refused: {e}");
                false
            }
        }
    }
}
