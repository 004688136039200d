//! Store Error Types

use std::time::Duration;

use ingest_core::IngestError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage worker failed: {0}")]
    Worker(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No records found for machine {0}")]
    MachineNotFound(String),
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MachineNotFound(machine_id) => {
                IngestError::NotFound(format!("No data found for machine {}", machine_id))
            }
            other => IngestError::Storage(other.to_string()),
        }
    }
}
