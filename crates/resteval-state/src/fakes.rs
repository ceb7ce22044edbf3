//! In-memory `RunStore` implementations
//!
//! `MemoryRunStore` keeps every saved snapshot so tests can assert on the
//! exact sequence of writes a run went through. `FaultInjectingStore` wraps
//! another store and starts failing loads after a budget is spent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::RunRecord;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryRunStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RunSlot {
    current: Option<RunRecord>,
    history: Vec<RunRecord>,
}

/// In-memory run store backed by a `HashMap<run_id, RunSlot>`.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: Mutex<HashMap<String, RunSlot>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record saved under `run_id`, oldest first.
    pub fn history(&self, run_id: &RunId) -> Vec<RunRecord> {
        let runs = self.runs.lock().unwrap();
        runs.get(&run_id.0)
            .map(|slot| slot.history.clone())
            .unwrap_or_default()
    }

    /// Number of `save` calls recorded for `run_id`.
    pub fn save_count(&self, run_id: &RunId) -> usize {
        let runs = self.runs.lock().unwrap();
        runs.get(&run_id.0).map(|slot| slot.history.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn load(&self, run_id: &RunId) -> StorageResult<Option<RunRecord>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs.get(&run_id.0).and_then(|slot| slot.current.clone()))
    }

    async fn save(&self, record: &RunRecord) -> StorageResult<()> {
        let mut runs = self.runs.lock().unwrap();
        let slot = runs.entry(record.run_id.0.clone()).or_default();
        slot.current = Some(record.clone());
        slot.history.push(record.clone());
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<RunRecord>> {
        let runs = self.runs.lock().unwrap();
        let mut records: Vec<RunRecord> = runs
            .values()
            .filter_map(|slot| slot.current.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// FaultInjectingStore
// ---------------------------------------------------------------------------

/// Wraps a store and fails every `load` after the first `healthy_loads`.
///
/// Saves always pass through, which lets a test drive the engine into its
/// failure path and still observe the terminal record it persists.
#[derive(Debug)]
pub struct FaultInjectingStore<S> {
    inner: S,
    healthy_loads: usize,
    loads: AtomicUsize,
}

impl<S: RunStore> FaultInjectingStore<S> {
    pub fn new(inner: S, healthy_loads: usize) -> Self {
        Self {
            inner,
            healthy_loads,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RunStore> RunStore for FaultInjectingStore<S> {
    async fn load(&self, run_id: &RunId) -> StorageResult<Option<RunRecord>> {
        let n = self.loads.fetch_add(1, Ordering::SeqCst);
        if n >= self.healthy_loads {
            return Err(StorageError::Backend(format!(
                "injected load failure #{} for {run_id}",
                n + 1 - self.healthy_loads
            )));
        }
        self.inner.load(run_id).await
    }

    async fn save(&self, record: &RunRecord) -> StorageResult<()> {
        self.inner.save(record).await
    }

    async fn list(&self) -> StorageResult<Vec<RunRecord>> {
        self.inner.list().await
    }
}
