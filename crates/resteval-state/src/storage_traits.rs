//! Storage trait definitions for resteval
//!
//! `RunStore` is the only persistence seam the engine depends on: load a run
//! by id, replace it wholesale, and list what is stored. Backends are
//! interchangeable; in-memory fakes live in the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::schema::RunRecord;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Opaque identifier of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random RunId (12 lowercase hex chars).
    pub fn new() -> Self {
        let mut hex = uuid::Uuid::new_v4().simple().to_string();
        hex.truncate(12);
        RunId(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        RunId(s)
    }
}

/// Run record store.
///
/// Guarantees:
/// - `load` returns `Ok(None)` for unknown ids rather than an error.
/// - `save` replaces the whole record; there is no partial update, so a
///   reader observes either the previous or the new record.
/// - `list` returns records newest first (by `created_at`).
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Load a run by id.
    async fn load(&self, run_id: &RunId) -> StorageResult<Option<RunRecord>>;

    /// Insert or replace a run record.
    async fn save(&self, record: &RunRecord) -> StorageResult<()>;

    /// List stored runs, newest first.
    async fn list(&self) -> StorageResult<Vec<RunRecord>>;
}
