use serde::{Deserialize, Serialize};

pub const DEFAULT_LEGACY_KEY: &str = "lifesim_save";
pub const DEFAULT_FALLBACK_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveConfig {
    /// SQLite database path. `:memory:` for an isolated in-memory store.
    pub db_path: String,
    /// File backing the flat fallback store. `None` keeps it in memory.
    #[serde(default)]
    pub fallback_path: Option<String>,
    /// Byte quota for the flat fallback store.
    #[serde(default = "default_fallback_quota")]
    pub fallback_quota_bytes: usize,
    /// Flat-store key under which pre-transactional builds kept their save.
    #[serde(default = "default_legacy_key")]
    pub legacy_key: String,
    /// Number of rotating quick-save slots.
    pub quick_slot_count: u32,
    /// Game minutes between timer-driven auto-saves.
    pub autosave_interval_minutes: u64,
    /// Wall-clock window in which a repeated auto/quick trigger is ignored.
    pub save_cooldown_ms: i64,
    /// Auto-save on every scene transition.
    pub autosave_on_scene_transition: bool,
    /// Ask the platform not to evict the store at startup.
    #[serde(default = "default_true")]
    pub request_durability: bool,
}

fn default_fallback_quota() -> usize { DEFAULT_FALLBACK_QUOTA_BYTES }
fn default_legacy_key() -> String { DEFAULT_LEGACY_KEY.to_string() }
fn default_true() -> bool { true }

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            db_path:                      "lifesim.db".into(),
            fallback_path:                Some("lifesim_fallback.json".into()),
            fallback_quota_bytes:         DEFAULT_FALLBACK_QUOTA_BYTES,
            legacy_key:                   DEFAULT_LEGACY_KEY.into(),
            quick_slot_count:             3,
            autosave_interval_minutes:    30,
            save_cooldown_ms:             3_000,
            autosave_on_scene_transition: true,
            request_durability:           true,
        }
    }
}

impl SaveConfig {
    /// Load from a JSON config file.
    /// In tests, use SaveConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SaveConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if config.quick_slot_count == 0 {
            anyhow::bail!("{path}: quick_slot_count must be at least 1");
        }
        Ok(config)
    }

    /// In-memory store, in-memory fallback, same policy numbers as default.
    pub fn default_test() -> Self {
        Self {
            db_path:              ":memory:".into(),
            fallback_path:        None,
            request_durability:   false,
            ..Self::default()
        }
    }
}
