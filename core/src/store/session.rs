//! Current-session row, settings, and provider configuration.

use super::SaveStore;
use crate::{
    error::SaveResult,
    snapshot::CurrentGameState,
    types::{Millis, SaveTier},
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Endpoint and credentials for one AI service. Stored only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub service:    String,
    pub endpoint:   String,
    pub api_key:    String,
    pub model:      String,
    pub updated_at: Millis,
}

impl SaveStore {
    // ── Current game state ─────────────────────────────────────

    pub fn put_current_state(&self, state: &CurrentGameState) -> SaveResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO current_game_state
                (id, session_id, last_save_id, last_save_type, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                state.session_id,
                state.last_save_id,
                state.last_save_type.map(|t| t.as_str()),
                state.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn current_state(&self) -> SaveResult<Option<CurrentGameState>> {
        let row = self
            .conn
            .query_row(
                "SELECT session_id, last_save_id, last_save_type, updated_at
                 FROM current_game_state WHERE id = 1",
                [],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, Option<i64>>(1)?,
                        r.get::<_, Option<String>>(2)?,
                        r.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;
        Ok(row.map(|(session_id, last_save_id, last_save_type, updated_at)| {
            CurrentGameState {
                session_id,
                last_save_id,
                last_save_type: last_save_type.as_deref().and_then(SaveTier::parse),
                updated_at,
            }
        }))
    }

    // ── Settings ───────────────────────────────────────────────

    pub fn set_setting(&self, key: &str, value: &Value, now: Millis) -> SaveResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, serde_json::to_string(value)?, now],
        )?;
        Ok(())
    }

    /// `None` for a missing key or a value that no longer parses.
    pub fn setting(&self, key: &str) -> SaveResult<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|s| match serde_json::from_str(&s) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("setting '{key}' unreadable, ignoring: {e}");
                None
            }
        }))
    }

    // ── Provider config ────────────────────────────────────────

    pub fn upsert_provider_config(&self, config: &ProviderConfig) -> SaveResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO provider_config
                (service, endpoint, api_key, model, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                config.service,
                config.endpoint,
                config.api_key,
                config.model,
                config.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn provider_configs(&self) -> SaveResult<Vec<ProviderConfig>> {
        let mut stmt = self.conn.prepare(
            "SELECT service, endpoint, api_key, model, updated_at
             FROM provider_config ORDER BY service",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(ProviderConfig {
                    service:    r.get(0)?,
                    endpoint:   r.get(1)?,
                    api_key:    r.get(2)?,
                    model:      r.get(3)?,
                    updated_at: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn remove_provider_config(&self, service: &str) -> SaveResult<()> {
        self.conn.execute(
            "DELETE FROM provider_config WHERE service = ?1",
            params![service],
        )?;
        Ok(())
    }
}
