use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Reconciliation engine is disabled (flag '{flag}')")]
    FeatureDisabled { flag: String },

    #[error("Failed to open scan run: {message}")]
    ScanInit { message: String },

    #[error("Scan {scan_id} is already running")]
    ScanInProgress { scan_id: String },

    #[error("Unknown scan scope '{tag}'")]
    InvalidScope { tag: String },

    #[error("Invalid scan window: {0}")]
    Window(String),

    #[error("Scan {scan_id} failed: {message}")]
    Orchestrator { scan_id: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReconResult<T> = Result<T, ReconError>;
