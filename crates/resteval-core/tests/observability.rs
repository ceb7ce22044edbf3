//! Observability tests for run execution tracing.
//!
//! These drive `Engine::execute` end to end and check the lifecycle events
//! it emits: start, pair resolution, synthetic fallback, progress, finish.

use std::sync::Arc;
use std::time::Duration;

use resteval_core::{
    Engine, EngineConfig, MemoryRunStore, RunId, RunParams, RunRecord, RunStore, TaskType,
};
use tracing_test::traced_test;

fn quiet_config(root: &std::path::Path) -> EngineConfig {
    EngineConfig::default()
        .with_data_root(root)
        .with_min_duration(Duration::ZERO)
        .with_synthetic_size(32, 40)
}

async fn queued(store: &MemoryRunStore, task: TaskType, algorithm_id: &str) -> RunId {
    let run = RunRecord::queued(task, "ds_absent", algorithm_id, RunParams::new());
    store.save(&run).await.unwrap();
    run.run_id
}

/// Test: a synthetic run logs start, fallback, progress and finish
#[tokio::test]
#[traced_test]
async fn test_execute_emits_lifecycle_events() {
    let data = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRunStore::new());
    let run_id = queued(&store, TaskType::Deblur, "alg_deblur_unsharp").await;

    let outcome = Engine::new(store.clone(), quiet_config(data.path()))
        .execute(&run_id)
        .await;
    assert!(outcome.ok);

    assert!(logs_contain("run.started"));
    assert!(logs_contain("run.pairs_resolved"));
    assert!(logs_contain("run.synthetic_fallback"));
    assert!(logs_contain("synthetic_no_dataset"));
    assert!(logs_contain("run.pair_evaluated"));
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("status=done"));
    assert!(logs_contain(run_id.as_str()));
}

/// Test: executing an unknown run logs a skip and nothing else
#[tokio::test]
#[traced_test]
async fn test_missing_run_logs_skip() {
    let data = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRunStore::new());

    Engine::new(store, quiet_config(data.path()))
        .execute(&RunId::from("nobody000001"))
        .await;

    assert!(logs_contain("run.skipped"));
    assert!(logs_contain("not found"));
    assert!(!logs_contain("run.started"));
}

/// Test: a run canceled before start finishes without a start event
#[tokio::test]
#[traced_test]
async fn test_precanceled_run_logs_canceled_finish() {
    let data = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRunStore::new());
    let mut run = RunRecord::queued(TaskType::Sr, "ds_absent", "alg_sr_nearest", RunParams::new());
    run.cancel_requested = true;
    store.save(&run).await.unwrap();

    Engine::new(store, quiet_config(data.path()))
        .execute(&run.run_id)
        .await;

    assert!(!logs_contain("run.started"));
    assert!(logs_contain("run.finished"));
    assert!(logs_contain("status=canceled"));
}

/// Test: request_cancel logs the status it recorded
#[tokio::test]
#[traced_test]
async fn test_request_cancel_logs_status() {
    let store = MemoryRunStore::new();
    let run_id = queued(&store, TaskType::Denoise, "alg_denoise_gaussian").await;

    resteval_core::request_cancel(&store, &run_id).await.unwrap();

    assert!(logs_contain("run.cancel_requested"));
    assert!(logs_contain("status=canceled"));
}
