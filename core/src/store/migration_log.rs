//! Append-only migration/diagnostic log.

use super::SaveStore;
use crate::{error::SaveResult, snapshot::MigrationLogEntry};
use rusqlite::{params, Connection};

impl SaveStore {
    pub fn append_log(&self, entry: &MigrationLogEntry) -> SaveResult<()> {
        Self::insert_log(&self.conn, entry)
    }

    /// Shared with `migrate()`, which logs inside its own transaction.
    pub(super) fn insert_log(conn: &Connection, entry: &MigrationLogEntry) -> SaveResult<()> {
        conn.execute(
            "INSERT INTO migration_log (action, details, timestamp, success)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.action, entry.details, entry.timestamp, entry.success],
        )?;
        Ok(())
    }

    /// Every entry, oldest first.
    pub fn migration_log(&self) -> SaveResult<Vec<MigrationLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action, details, timestamp, success
             FROM migration_log ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], |r| {
                Ok(MigrationLogEntry {
                    id:        Some(r.get(0)?),
                    action:    r.get(1)?,
                    details:   r.get(2)?,
                    timestamp: r.get(3)?,
                    success:   r.get::<_, i32>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
