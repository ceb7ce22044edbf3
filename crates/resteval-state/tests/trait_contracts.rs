//! Trait contract tests for RunStore.
//!
//! Every backend must satisfy the same load/replace/list contract; the
//! contract functions below are run against the in-memory and filesystem
//! stores.

use chrono::{Duration, Utc};
use resteval_state::{
    FaultInjectingStore, FsRunStore, MemoryRunStore, RunId, RunParams, RunRecord, RunStatus,
    RunStore, StorageError, TaskType,
};

fn queued(task: TaskType) -> RunRecord {
    RunRecord::queued(task, "ds_demo", "alg_x", RunParams::new())
}

async fn contract_load_unknown_is_none(store: &dyn RunStore) {
    let missing = store.load(&RunId::from("missing0001")).await.unwrap();
    assert!(missing.is_none());
}

async fn contract_save_then_load(store: &dyn RunStore) {
    let mut run = queued(TaskType::Dehaze);
    run.params
        .insert("metrics".to_string(), serde_json::json!(["PSNR", "SSIM"]));
    store.save(&run).await.unwrap();

    let loaded = store.load(&run.run_id).await.unwrap().unwrap();
    assert_eq!(loaded, run);
}

async fn contract_save_replaces(store: &dyn RunStore) {
    let mut run = queued(TaskType::Denoise);
    store.save(&run).await.unwrap();

    run.start(Utc::now());
    run.finish_failed(Utc::now(), "Unexpected: boom");
    store.save(&run).await.unwrap();

    let loaded = store.load(&run.run_id).await.unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Failed);
    assert_eq!(loaded.error.as_deref(), Some("Unexpected: boom"));
}

async fn contract_list_newest_first(store: &dyn RunStore) {
    let mut older = queued(TaskType::Sr);
    older.created_at = Utc::now() - Duration::hours(1);
    let newer = queued(TaskType::Lowlight);
    store.save(&older).await.unwrap();
    store.save(&newer).await.unwrap();

    let listed = store.list().await.unwrap();
    let pos_new = listed.iter().position(|r| r.run_id == newer.run_id).unwrap();
    let pos_old = listed.iter().position(|r| r.run_id == older.run_id).unwrap();
    assert!(pos_new < pos_old);
}

#[tokio::test]
async fn memory_store_satisfies_contract() {
    let store = MemoryRunStore::new();
    contract_load_unknown_is_none(&store).await;
    contract_save_then_load(&store).await;
    contract_save_replaces(&store).await;
    contract_list_newest_first(&store).await;
}

#[tokio::test]
async fn fs_store_satisfies_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRunStore::new(dir.path()).unwrap();
    contract_load_unknown_is_none(&store).await;
    contract_save_then_load(&store).await;
    contract_save_replaces(&store).await;
    contract_list_newest_first(&store).await;
}

#[tokio::test]
async fn memory_store_keeps_save_history() {
    let store = MemoryRunStore::new();
    let mut run = queued(TaskType::Deblur);
    store.save(&run).await.unwrap();
    run.start(Utc::now());
    store.save(&run).await.unwrap();

    let history = store.history(&run.run_id);
    assert_eq!(store.save_count(&run.run_id), 2);
    assert_eq!(history[0].status, RunStatus::Queued);
    assert_eq!(history[1].status, RunStatus::Running);
}

#[tokio::test]
async fn fault_injecting_store_fails_after_budget() {
    let store = FaultInjectingStore::new(MemoryRunStore::new(), 1);
    let run = queued(TaskType::Dehaze);
    store.save(&run).await.unwrap();

    assert!(store.load(&run.run_id).await.unwrap().is_some());
    let err = store.load(&run.run_id).await.unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));

    // saves still reach the wrapped store
    assert_eq!(store.inner().save_count(&run.run_id), 1);
}
