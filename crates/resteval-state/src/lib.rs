//! resteval-state: run records and their persistence.
//!
//! This crate owns the shape of a persisted evaluation run and the storage
//! abstraction the engine reads and writes it through.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: a simple load/replace record store. There are no transactions;
//! the last writer wins and the engine is the only writer while a run is
//! `running`.
//!
//! ## Key Components
//!
//! - `RunRecord`: the persisted run (status, timestamps, metrics, samples)
//! - `RunStore`: async load/save/list trait implemented by every backend
//! - `MemoryRunStore`: in-memory backend with save history (tests, embedding)
//! - `FsRunStore`: one JSON blob per run under a directory, atomically replaced

mod error;
pub mod fakes;
pub mod fs_store;
pub mod schema;
pub mod storage_traits;

pub use error::StorageError;
pub use fakes::{FaultInjectingStore, MemoryRunStore};
pub use fs_store::FsRunStore;
pub use schema::{RunParams, RunRecord, RunStatus, SampleResult, TaskType};
pub use storage_traits::{RunId, RunStore, StorageResult};
