use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Transactional store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Store transaction failed: {0}")]
    TransactionFailed(#[from] rusqlite::Error),

    #[error("Flat store quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Corrupt save record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },

    #[error("Capture degraded for collaborator '{key}': {reason}")]
    SnapshotCaptureDegraded { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Collaborator '{key}' is already registered")]
    DuplicateCollaborator { key: String },

    #[error("Collaborator rejected at registration: {reason}")]
    InvalidCollaborator { reason: String },

    #[error("Save {id} not found")]
    SaveNotFound { id: i64 },

    #[error("No manual save named '{name}'")]
    NamedSaveNotFound { name: String },

    #[error("Unknown scene '{id}'")]
    UnknownScene { id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SaveResult<T> = Result<T, SaveError>;
