//! Error types for resteval-state

use thiserror::Error;

/// Errors that can occur in the run persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem error while reading or writing a record
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A stored blob exists but does not decode into a run record
    #[error("corrupt run record {run_id}: {reason}")]
    Corrupt { run_id: String, reason: String },

    /// Run id cannot be used as a storage key
    #[error("invalid run id: {run_id:?}")]
    InvalidRunId { run_id: String },

    /// Backend-specific failure (connection loss, injected faults, ...)
    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
