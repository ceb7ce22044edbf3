//! Structured observability hooks for run execution.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - Emission functions for lifecycle events: start, per-pair progress,
//!   fallbacks, cancellation, finish
//!
//! Events are emitted at `info!` level unless noted; filter with `RUST_LOG`.

use tracing::{info, warn};

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("3f2a9c01b7de");
/// // every event below carries run_id = "3f2a9c01b7de"
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run_id.
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: run_span(run_id).entered(),
        }
    }
}

/// The run-scoped span, for instrumenting futures (an entered guard must
/// not be held across `.await`).
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("resteval.run", run_id = %run_id)
}

/// Emit event: run moved to `running`.
pub fn emit_run_started(run_id: &str, task: &str, dataset_id: &str, algorithm_id: &str, seed: &str) {
    info!(
        event = "run.started",
        run_id = %run_id,
        task = %task,
        dataset_id = %dataset_id,
        algorithm_id = %algorithm_id,
        seed = %seed,
    );
}

/// Emit event: execution returned without running the pipeline.
pub fn emit_run_skipped(run_id: &str, reason: &str) {
    info!(event = "run.skipped", run_id = %run_id, reason = %reason);
}

/// Emit event: dataset pairs resolved for the run.
pub fn emit_pairs_resolved(run_id: &str, input_dir: &str, pairs: usize) {
    info!(event = "run.pairs_resolved", run_id = %run_id, input_dir = %input_dir, pairs = pairs);
}

/// Emit event: one pair scored (progress is `index` of `total`).
pub fn emit_pair_evaluated(run_id: &str, name: &str, index: usize, total: usize, psnr: f64, ssim: f64) {
    info!(
        event = "run.pair_evaluated",
        run_id = %run_id,
        name = %name,
        index = index,
        total = total,
        psnr = psnr,
        ssim = ssim,
    );
}

/// Emit event (warning level): a pair could not be decoded and was skipped.
pub fn emit_pair_skipped(run_id: &str, name: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.pair_skipped", run_id = %run_id, name = %name, error = %error);
}

/// Emit event: the synthetic pair replaces the dataset.
pub fn emit_synthetic_fallback(run_id: &str, data_mode: &str) {
    info!(event = "run.synthetic_fallback", run_id = %run_id, data_mode = %data_mode);
}

/// Emit event: a cancellation request was recorded by a collaborator.
pub fn emit_cancel_requested(run_id: &str, status: &str) {
    info!(event = "run.cancel_requested", run_id = %run_id, status = %status);
}

/// Emit event: run reached a terminal status.
pub fn emit_run_finished(run_id: &str, status: &str, duration_ms: u64, samples: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = %status,
        duration_ms = duration_ms,
        samples = samples,
    );
}

/// Emit event: terminal persist failed (warning level).
pub fn emit_run_finalize_error(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.finalize_error", run_id = %run_id, error = %error);
}
