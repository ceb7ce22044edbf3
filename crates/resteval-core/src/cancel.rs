//! Cooperative cancellation.
//!
//! A run is never interrupted. The engine polls the stored record through a
//! [`CancelToken`] at its checkpoints, and collaborators flag a run with
//! [`request_cancel`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;

use resteval_state::{RunId, RunRecord, RunStatus, RunStore};

use crate::domain::{EvalError, Result};

/// Reads the cancellation flag of one run from the store.
#[derive(Clone)]
pub struct CancelToken {
    store: Arc<dyn RunStore>,
    run_id: RunId,
}

impl CancelToken {
    pub fn new(store: Arc<dyn RunStore>, run_id: RunId) -> Self {
        Self { store, run_id }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Whether a cancellation has been requested for the run.
    pub async fn is_canceled(&self) -> Result<bool> {
        let record = self
            .store
            .load(&self.run_id)
            .await?
            .ok_or_else(|| EvalError::NotFound {
                run_id: self.run_id.to_string(),
            })?;
        Ok(record.cancellation_pending())
    }

    /// `Err(Canceled)` once a cancellation is pending.
    pub async fn checkpoint(&self, at: &str) -> Result<()> {
        if self.is_canceled().await? {
            debug!(run_id = %self.run_id, checkpoint = at, "cancellation observed");
            return Err(EvalError::Canceled);
        }
        Ok(())
    }

    /// Sleep until `deadline`, checking for cancellation every `poll`.
    ///
    /// A `None` deadline (a pacing floor past the clock's range) only ends
    /// on cancellation.
    pub async fn sleep_until(&self, deadline: Option<Instant>, poll: Duration) -> Result<()> {
        loop {
            self.checkpoint("pacing").await?;
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    (deadline - now).min(poll)
                }
                None => poll,
            };
            tokio::time::sleep(slice).await;
        }
    }
}

/// Flag a run for cancellation.
///
/// Terminal runs are returned unchanged. A queued run is canceled on the
/// spot without involving the engine; a running run is marked `canceling`
/// and left for the engine to observe.
pub async fn request_cancel(store: &dyn RunStore, run_id: &RunId) -> Result<RunRecord> {
    let mut run = store
        .load(run_id)
        .await?
        .ok_or_else(|| EvalError::NotFound {
            run_id: run_id.to_string(),
        })?;

    match run.status {
        RunStatus::Done | RunStatus::Failed | RunStatus::Canceled => return Ok(run),
        RunStatus::Queued => {
            run.finish_canceled(Utc::now(), "canceled before start");
        }
        RunStatus::Running | RunStatus::Canceling => {
            run.cancel_requested = true;
            run.status = RunStatus::Canceling;
        }
    }
    store.save(&run).await?;
    crate::obs::emit_cancel_requested(run_id.as_str(), run.status.as_str());
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resteval_state::{MemoryRunStore, RunParams, TaskType};

    fn queued() -> RunRecord {
        RunRecord::queued(TaskType::Denoise, "ds", "alg_denoise_nlm", RunParams::new())
    }

    #[tokio::test]
    async fn queued_run_is_canceled_immediately() {
        let store = MemoryRunStore::new();
        let run = queued();
        store.save(&run).await.unwrap();

        let out = request_cancel(&store, &run.run_id).await.unwrap();
        assert_eq!(out.status, RunStatus::Canceled);
        assert_eq!(out.error.as_deref(), Some("canceled before start"));
        assert!(out.finished_at.is_some());
        assert!(out.elapsed.is_some());
    }

    #[tokio::test]
    async fn running_run_becomes_canceling() {
        let store = MemoryRunStore::new();
        let mut run = queued();
        run.start(Utc::now());
        store.save(&run).await.unwrap();

        let out = request_cancel(&store, &run.run_id).await.unwrap();
        assert_eq!(out.status, RunStatus::Canceling);
        assert!(out.cancel_requested);
        assert!(out.finished_at.is_none());
    }

    #[tokio::test]
    async fn terminal_run_is_untouched() {
        let store = MemoryRunStore::new();
        let mut run = queued();
        run.start(Utc::now());
        run.finish_failed(Utc::now(), "Unexpected: x");
        store.save(&run).await.unwrap();

        let out = request_cancel(&store, &run.run_id).await.unwrap();
        assert_eq!(out, run);
        assert_eq!(store.save_count(&run.run_id), 1);
    }

    #[tokio::test]
    async fn missing_run_is_not_found() {
        let store = MemoryRunStore::new();
        let err = request_cancel(&store, &RunId::from("ghost")).await.unwrap_err();
        assert!(matches!(err, EvalError::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_sleep_stops_on_cancel() {
        let store = Arc::new(MemoryRunStore::new());
        let mut run = queued();
        run.start(Utc::now());
        store.save(&run).await.unwrap();

        let token = CancelToken::new(store.clone(), run.run_id.clone());
        let deadline = Instant::now() + Duration::from_secs(10);

        let flagger = {
            let store = store.clone();
            let run_id = run.run_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                request_cancel(store.as_ref(), &run_id).await.unwrap();
            })
        };

        let err = token
            .sleep_until(Some(deadline), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Canceled));
        assert!(Instant::now() < deadline);
        flagger.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_pacing_ends_only_on_cancel() {
        let store = Arc::new(MemoryRunStore::new());
        let mut run = queued();
        run.start(Utc::now());
        store.save(&run).await.unwrap();

        let token = CancelToken::new(store.clone(), run.run_id.clone());
        let flagger = {
            let store = store.clone();
            let run_id = run.run_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                request_cancel(store.as_ref(), &run_id).await.unwrap();
            })
        };

        let started = Instant::now();
        let err = token
            .sleep_until(None, Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Canceled));
        assert!(started.elapsed() >= Duration::from_secs(3));
        flagger.await.unwrap();
    }
}
