//! Atomic counters for engine observability.
//!
//! Each [`crate::Engine`] owns one `Metrics`. Counters are incremented
//! silently; [`Metrics::flush`] emits the current values as one
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight atomic counters, no allocations and no locking.
#[derive(Debug)]
pub struct Metrics {
    runs_started: AtomicU64,
    runs_done: AtomicU64,
    runs_failed: AtomicU64,
    runs_canceled: AtomicU64,
    pairs_evaluated: AtomicU64,
    transforms_applied: AtomicU64,
    synthetic_fallbacks: AtomicU64,
    niqe_fallbacks: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = stringify!($field), "counter incremented");
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_done: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            runs_canceled: AtomicU64::new(0),
            pairs_evaluated: AtomicU64::new(0),
            transforms_applied: AtomicU64::new(0),
            synthetic_fallbacks: AtomicU64::new(0),
            niqe_fallbacks: AtomicU64::new(0),
        }
    }

    counter!(inc_runs_started, runs_started, runs_started);
    counter!(inc_runs_done, runs_done, runs_done);
    counter!(inc_runs_failed, runs_failed, runs_failed);
    counter!(inc_runs_canceled, runs_canceled, runs_canceled);
    counter!(inc_pairs_evaluated, pairs_evaluated, pairs_evaluated);
    counter!(inc_transforms, transforms_applied, transforms_applied);
    counter!(inc_synthetic_fallbacks, synthetic_fallbacks, synthetic_fallbacks);
    counter!(inc_niqe_fallbacks, niqe_fallbacks, niqe_fallbacks);

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call at natural boundaries (end of a run) rather than per increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            runs_done = self.runs_done(),
            runs_failed = self.runs_failed(),
            runs_canceled = self.runs_canceled(),
            pairs_evaluated = self.pairs_evaluated(),
            transforms_applied = self.transforms_applied(),
            synthetic_fallbacks = self.synthetic_fallbacks(),
            niqe_fallbacks = self.niqe_fallbacks(),
        );
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for c in [
            &self.runs_started,
            &self.runs_done,
            &self.runs_failed,
            &self.runs_canceled,
            &self.pairs_evaluated,
            &self.transforms_applied,
            &self.synthetic_fallbacks,
            &self.niqe_fallbacks,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}
