//! Save record queries.

use super::SaveStore;
use crate::{
    error::{SaveError, SaveResult},
    snapshot::SaveRecord,
    types::{SaveId, SaveTier},
};
use rusqlite::{params, OptionalExtension, Row};

/// Raw row before the JSON payload is trusted.
struct SaveRow {
    id:        SaveId,
    save_type: String,
    slot:      Option<u32>,
    name:      String,
    timestamp: i64,
    game_data: String,
}

impl SaveRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id:        r.get(0)?,
            save_type: r.get(1)?,
            slot:      r.get(2)?,
            name:      r.get(3)?,
            timestamp: r.get(4)?,
            game_data: r.get(5)?,
        })
    }

    fn into_record(self) -> SaveResult<SaveRecord> {
        let tier = SaveTier::parse(&self.save_type).ok_or_else(|| SaveError::CorruptRecord {
            id:     self.id,
            reason: format!("unknown save type '{}'", self.save_type),
        })?;
        let game_data = serde_json::from_str(&self.game_data).map_err(|e| {
            SaveError::CorruptRecord {
                id:     self.id,
                reason: format!("game_data is not valid JSON: {e}"),
            }
        })?;
        Ok(SaveRecord {
            id: Some(self.id),
            tier,
            slot: self.slot,
            name: self.name,
            timestamp: self.timestamp,
            game_data,
        })
    }
}

const SELECT_SAVE: &str =
    "SELECT id, save_type, slot, name, timestamp, game_data FROM saves";

impl SaveStore {
    /// Insert or overwrite-in-place.
    ///
    /// A record with a slot replaces whatever already occupies its
    /// (type, slot) pair, keeping that row's id. A record without a slot
    /// always inserts. Returns the row id.
    pub fn write_save(&self, record: &SaveRecord) -> SaveResult<SaveId> {
        let payload = serde_json::to_string(&record.game_data)?;
        let tier = record.tier.as_str();

        let tx = self.conn.unchecked_transaction()?;
        let existing: Option<SaveId> = match record.slot {
            Some(slot) => tx
                .query_row(
                    "SELECT id FROM saves WHERE save_type = ?1 AND slot = ?2",
                    params![tier, slot],
                    |r| r.get(0),
                )
                .optional()?,
            None => None,
        };

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE saves SET name = ?1, timestamp = ?2, game_data = ?3
                     WHERE id = ?4",
                    params![record.name, record.timestamp, payload, id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO saves (save_type, slot, name, timestamp, game_data)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![tier, record.slot, record.name, record.timestamp, payload],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.commit()?;

        log::debug!(
            "save written id={id} type={tier} slot={:?} ({} bytes)",
            record.slot,
            payload.len()
        );
        Ok(id)
    }

    /// `Ok(None)` when no row has this id. A row that exists but cannot
    /// be parsed is CorruptRecord.
    pub fn read_save(&self, id: SaveId) -> SaveResult<Option<SaveRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_SAVE} WHERE id = ?1"),
                params![id],
                SaveRow::from_row,
            )
            .optional()?;
        row.map(SaveRow::into_record).transpose()
    }

    /// All records, or those of one tier, newest first. Unparseable rows
    /// are skipped with a warning.
    pub fn list_saves(&self, tier: Option<SaveTier>) -> SaveResult<Vec<SaveRecord>> {
        let rows = match tier {
            Some(t) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_SAVE} WHERE save_type = ?1 ORDER BY timestamp DESC, id DESC"
                ))?;
                let rows = stmt
                    .query_map(params![t.as_str()], SaveRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_SAVE} ORDER BY timestamp DESC, id DESC"
                ))?;
                let rows = stmt
                    .query_map([], SaveRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_record() {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("skipping unreadable save: {e}"),
            }
        }
        Ok(records)
    }

    /// Idempotent: deleting a missing id is not an error.
    pub fn remove_save(&self, id: SaveId) -> SaveResult<()> {
        let removed = self
            .conn
            .execute("DELETE FROM saves WHERE id = ?1", params![id])?;
        if removed > 0 {
            log::debug!("save {id} removed");
        }
        Ok(())
    }

    /// Highest slot held by any row of `tier`, readable or not.
    pub fn max_slot(&self, tier: SaveTier) -> SaveResult<Option<u32>> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(slot) FROM saves WHERE save_type = ?1",
            params![tier.as_str()],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    /// Number of stored save rows, readable or not.
    #[cfg(feature = "test-util")]
    pub fn save_count(&self) -> SaveResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM saves", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Overwrite a row's payload with arbitrary text.
    #[cfg(feature = "test-util")]
    pub fn overwrite_raw_game_data(&self, id: SaveId, raw: &str) -> SaveResult<()> {
        self.conn.execute(
            "UPDATE saves SET game_data = ?1 WHERE id = ?2",
            params![raw, id],
        )?;
        Ok(())
    }
}
