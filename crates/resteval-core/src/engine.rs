//! Run execution: the state machine around the evaluation pipeline.
//!
//! `execute` loads a run, moves it to `running`, evaluates the dataset (or
//! the synthetic fallback), and writes exactly one terminal record. All
//! pixel work runs on the blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::time::Instant;
use tracing::Instrument;

use resteval_state::{RunId, RunParams, RunRecord, RunStore, SampleResult};

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::dataset::find_pairs;
use crate::dispatch::resolve;
use crate::domain::{EvalError, ExecutionOutcome, Result};
use crate::evaluate::{evaluate_pair_with, Aggregate, PairMetrics, QualityScorer};
use crate::metrics::Metrics;
use crate::obs::{self, RunSpan};
use crate::seed::{run_seed, seed_hex, simulated_metrics};
use crate::synthetic::{synthesize, SYNTHETIC_NAME};
use crate::vision::niqe_score;

pub const DATA_MODE_REAL: &str = "real_dataset";
pub const DATA_MODE_SYNTHETIC: &str = "synthetic_no_dataset";
pub const DATA_MODE_READ_FAILED: &str = "dataset_read_failed_or_empty";
pub const DATA_MODE_SIMULATED: &str = "simulated_unsupported_task";

/// Result of a pipeline that ran to completion.
struct Completed {
    metrics: BTreeMap<String, f64>,
    samples: Vec<SampleResult>,
    patch: RunParams,
}

/// Executes runs against a [`RunStore`].
pub struct Engine {
    store: Arc<dyn RunStore>,
    config: EngineConfig,
    metrics: Arc<Metrics>,
    scorer: QualityScorer,
}

impl Engine {
    pub fn new(store: Arc<dyn RunStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            metrics: Arc::new(Metrics::new()),
            scorer: niqe_score,
        }
    }

    /// Replace the no-reference scorer (NIQE by default).
    pub fn with_quality_scorer(mut self, scorer: QualityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Execute one run to a terminal state.
    ///
    /// Never panics on run-level failures: every error is persisted on the
    /// record (when one exists) and reported in the outcome.
    pub async fn execute(&self, run_id: &RunId) -> ExecutionOutcome {
        self.execute_inner(run_id)
            .instrument(obs::run_span(run_id.as_str()))
            .await
    }

    async fn execute_inner(&self, run_id: &RunId) -> ExecutionOutcome {
        let clock = Instant::now();
        let mut run = match self.store.load(run_id).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                obs::emit_run_skipped(run_id.as_str(), "not found");
                return ExecutionOutcome::failure(run_id.as_str(), "not found");
            }
            Err(e) => {
                let err = EvalError::from(e);
                obs::emit_run_finalize_error(run_id.as_str(), &err);
                return ExecutionOutcome::failure(run_id.as_str(), err.record_message());
            }
        };

        if run.status.is_terminal() || run.cancellation_pending() {
            run.finish_canceled(Utc::now(), "already canceled");
            self.metrics.inc_runs_canceled();
            let outcome = ExecutionOutcome::failure(run_id.as_str(), "already canceled");
            return self.persist_terminal(run, outcome, clock).await;
        }

        run.start(Utc::now());
        if let Err(e) = self.store.save(&run).await {
            let err = EvalError::from(e);
            run.finish_failed(Utc::now(), err.record_message());
            self.metrics.inc_runs_failed();
            let outcome = ExecutionOutcome::failure(run_id.as_str(), err.record_message());
            return self.persist_terminal(run, outcome, clock).await;
        }
        self.metrics.inc_runs_started();
        let seed = run_seed(&run);
        obs::emit_run_started(
            run_id.as_str(),
            run.task_type.as_str(),
            &run.dataset_id,
            &run.algorithm_id,
            &seed_hex(seed),
        );

        let token = CancelToken::new(self.store.clone(), run.run_id.clone());
        let outcome = match self.run_pipeline(&run, seed, &token).await {
            Ok(done) => {
                let outcome = ExecutionOutcome::success(run_id.as_str(), done.metrics.clone());
                run.finish_done(Utc::now(), done.metrics, done.samples, done.patch);
                self.metrics.inc_runs_done();
                outcome
            }
            Err(EvalError::Canceled) => {
                run.finish_canceled(Utc::now(), "canceled");
                self.metrics.inc_runs_canceled();
                ExecutionOutcome::failure(run_id.as_str(), "canceled")
            }
            Err(e) => {
                let message = e.record_message();
                run.finish_failed(Utc::now(), message.clone());
                self.metrics.inc_runs_failed();
                ExecutionOutcome::failure(run_id.as_str(), message)
            }
        };
        self.persist_terminal(run, outcome, clock).await
    }

    async fn persist_terminal(
        &self,
        run: RunRecord,
        outcome: ExecutionOutcome,
        clock: Instant,
    ) -> ExecutionOutcome {
        let run_id = run.run_id.as_str();
        if let Err(e) = self.store.save(&run).await {
            let err = EvalError::from(e);
            obs::emit_run_finalize_error(run_id, &err);
            return ExecutionOutcome::failure(run_id, err.record_message());
        }
        obs::emit_run_finished(
            run_id,
            run.status.as_str(),
            clock.elapsed().as_millis() as u64,
            run.samples.len(),
        );
        self.metrics.flush();
        outcome
    }

    async fn run_pipeline(&self, run: &RunRecord, seed: u64, token: &CancelToken) -> Result<Completed> {
        let deadline = Instant::now().checked_add(self.config.min_duration);
        let poll = self.config.cancel_poll;
        let task = run.task_type;
        let input_dir = task.input_dir();

        let mut patch = RunParams::new();
        patch.insert("input_dir".into(), json!(input_dir));

        if !task.is_image_task() {
            token.sleep_until(deadline, poll).await?;
            patch.insert("data_mode".into(), json!(DATA_MODE_SIMULATED));
            patch.insert("niqe_fallback".into(), json!(true));
            return Ok(Completed {
                metrics: simulated_metrics(seed),
                samples: Vec::new(),
                patch,
            });
        }

        let spec = resolve(task, &run.algorithm_id).ok_or_else(|| {
            EvalError::unexpected("LookupError", format!("no algorithm registered for {task}"))
        })?;
        let params = Arc::new(spec.sanitize(&run.params));
        let absent = || EvalError::DataAbsent {
            dataset_id: run.dataset_id.clone(),
            input_dir: input_dir.to_string(),
        };

        let pairs = {
            let root = self.config.data_root.clone();
            let dataset_id = run.dataset_id.clone();
            let limit = self.config.sample_limit;
            tokio::task::spawn_blocking(move || find_pairs(&root, &dataset_id, input_dir, limit))
                .await?
        };
        obs::emit_pairs_resolved(run.run_id.as_str(), input_dir, pairs.len());
        if pairs.is_empty() && run.strict_validate {
            return Err(absent());
        }

        let mut agg = Aggregate::new();
        let total = pairs.len();
        for (index, pair) in pairs.iter().enumerate() {
            token.checkpoint("pair").await?;

            let job = {
                let pair = pair.clone();
                let params = params.clone();
                let counters = self.metrics.clone();
                let run_id = run.run_id.to_string();
                let scorer = self.scorer;
                move || -> Result<Option<PairMetrics>> {
                    let _span = RunSpan::enter(&run_id);
                    let (input, gt) = match pair.load() {
                        Ok(images) => images,
                        Err(e) => {
                            obs::emit_pair_skipped(&run_id, &pair.name, &e);
                            return Ok(None);
                        }
                    };
                    counters.inc_transforms();
                    evaluate_pair_with(spec, &params, &input, &gt, seed, scorer).map(Some)
                }
            };

            if let Some(m) = tokio::task::spawn_blocking(job).await?? {
                obs::emit_pair_evaluated(
                    run.run_id.as_str(),
                    &pair.name,
                    index + 1,
                    total,
                    m.psnr,
                    m.ssim,
                );
                self.record_pair(&m);
                agg.push(pair.name.clone(), m);
            }
        }

        let data_used = agg.len();
        let data_mode = if !agg.is_empty() {
            DATA_MODE_REAL
        } else if pairs.is_empty() {
            DATA_MODE_SYNTHETIC
        } else {
            DATA_MODE_READ_FAILED
        };

        if agg.is_empty() {
            if run.strict_validate {
                return Err(absent());
            }
            token.checkpoint("synthetic").await?;
            obs::emit_synthetic_fallback(run.run_id.as_str(), data_mode);
            self.metrics.inc_synthetic_fallbacks();

            let job = {
                let params = params.clone();
                let counters = self.metrics.clone();
                let run_id = run.run_id.to_string();
                let size = self.config.synthetic_size;
                let scorer = self.scorer;
                move || -> Result<PairMetrics> {
                    let _span = RunSpan::enter(&run_id);
                    let pair = synthesize(task, seed, size);
                    counters.inc_transforms();
                    evaluate_pair_with(spec, &params, &pair.input, &pair.gt, seed, scorer)
                }
            };
            let m = tokio::task::spawn_blocking(job).await??;
            obs::emit_pair_evaluated(run.run_id.as_str(), SYNTHETIC_NAME, 1, 1, m.psnr, m.ssim);
            self.record_pair(&m);
            agg.push(SYNTHETIC_NAME, m);
        }

        token.sleep_until(deadline, poll).await?;

        let (metrics, samples) = agg.finish();
        patch.insert("data_mode".into(), json!(data_mode));
        patch.insert("data_used".into(), json!(data_used));
        patch.insert("algo_elapsed".into(), json!(agg.mean_algo_elapsed()));
        patch.insert("niqe_fallback".into(), json!(agg.any_niqe_fallback()));
        patch.insert("real_algo".into(), json!(spec.real_algo));
        patch.insert("algorithm_id_resolved".into(), json!(spec.id));
        Ok(Completed {
            metrics,
            samples,
            patch,
        })
    }

    fn record_pair(&self, m: &PairMetrics) {
        self.metrics.inc_pairs_evaluated();
        if m.niqe_fallback {
            self.metrics.inc_niqe_fallbacks();
        }
    }
}
