use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::StorageError;
use crate::schema::RunRecord;
use crate::storage_traits::{RunId, RunStore, StorageResult};

/// Filesystem-backed run store: one pretty-printed JSON blob per run.
///
/// Layout: `<root>/runs/<run_id>.json`. File I/O runs on the blocking pool.
pub struct FsRunStore {
    runs_dir: PathBuf,
}

impl FsRunStore {
    /// Create a new `FsRunStore` rooted at `root`. Creates `root/runs/` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let runs_dir = root.as_ref().join("runs");
        fs::create_dir_all(&runs_dir)?;
        Ok(Self { runs_dir })
    }

    fn record_path(&self, run_id: &RunId) -> StorageResult<PathBuf> {
        let id = run_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidRunId {
                run_id: id.to_string(),
            });
        }
        Ok(self.runs_dir.join(format!("{id}.json")))
    }

    fn decode(run_id: &str, bytes: &[u8]) -> StorageResult<RunRecord> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt {
            run_id: run_id.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Run `f` on the blocking pool.
async fn blocking<T, F>(f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Backend(format!("blocking store task failed: {e}")))?
}

#[async_trait]
impl RunStore for FsRunStore {
    async fn load(&self, run_id: &RunId) -> StorageResult<Option<RunRecord>> {
        let path = self.record_path(run_id)?;
        let id = run_id.as_str().to_string();
        blocking(move || match fs::read(&path) {
            Ok(bytes) => Self::decode(&id, &bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        })
        .await
    }

    async fn save(&self, record: &RunRecord) -> StorageResult<()> {
        let path = self.record_path(&record.run_id)?;
        let bytes = serde_json::to_vec_pretty(record)?;
        let dir = self.runs_dir.clone();

        // Atomic replace: write to a temp file in the same directory, then rename.
        blocking(move || {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
    }

    async fn list(&self) -> StorageResult<Vec<RunRecord>> {
        let dir = self.runs_dir.clone();
        blocking(move || {
            let mut records = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match Self::decode(&stem, &fs::read(&path)?) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable run record")
                    }
                }
            }
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RunParams, RunStatus, TaskType};

    fn make_store() -> (tempfile::TempDir, FsRunStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRunStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn queued() -> RunRecord {
        RunRecord::queued(TaskType::Denoise, "ds", "alg_denoise_nlm", RunParams::new())
    }

    #[tokio::test]
    async fn record_roundtrip() {
        let (_dir, store) = make_store();
        let run = queued();
        store.save(&run).await.unwrap();
        let loaded = store.load(&run.run_id).await.unwrap().unwrap();
        assert_eq!(loaded, run);
    }

    #[tokio::test]
    async fn save_replaces_existing_record() {
        let (dir, store) = make_store();
        let mut run = queued();
        store.save(&run).await.unwrap();
        run.start(chrono::Utc::now());
        store.save(&run).await.unwrap();

        let loaded = store.load(&run.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Running);

        let files: Vec<_> = std::fs::read_dir(dir.path().join("runs")).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let (_dir, store) = make_store();
        assert!(store.load(&RunId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let (_dir, store) = make_store();
        match store.load(&RunId::from("../escape")).await {
            Err(StorageError::InvalidRunId { run_id }) => assert_eq!(run_id, "../escape"),
            other => panic!("expected InvalidRunId, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_saves_from_many_tasks_all_land() {
        let (_dir, store) = make_store();
        let store = std::sync::Arc::new(store);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let run = queued();
                store.save(&run).await.unwrap();
                run.run_id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        assert_eq!(store.list().await.unwrap().len(), 16);
        for id in &ids {
            assert!(store.load(id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn corrupt_blob_reports_corrupt() {
        let (dir, store) = make_store();
        std::fs::write(dir.path().join("runs").join("bad.json"), b"{not json").unwrap();
        match store.load(&RunId::from("bad")).await {
            Err(StorageError::Corrupt { run_id, .. }) => assert_eq!(run_id, "bad"),
            other => panic!("expected Corrupt, got {other:?}"),
        }
        // list skips it instead of failing
        assert!(store.list().await.unwrap().is_empty());
    }
}
