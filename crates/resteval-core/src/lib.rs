//! resteval core library
//!
//! Run execution and evaluation for image-restoration algorithms: the run
//! state machine with cooperative cancellation, dataset pairing with a
//! seeded synthetic fallback, the algorithm dispatch table, and the metric
//! pipeline (PSNR, SSIM, NIQE-style score).

pub mod cancel;
pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod evaluate;
pub mod metrics;
pub mod obs;
pub mod params;
pub mod seed;
pub mod synthetic;
pub mod telemetry;
pub mod vision;

pub use cancel::{request_cancel, CancelToken};
pub use config::EngineConfig;
pub use dataset::{ensure_real_pairs, find_pairs, PairedSample};
pub use dispatch::{
    algorithms_for, apply, baseline, resolve, AlgorithmKind, AlgorithmSpec, TransformContext,
    ALGORITHMS,
};
pub use domain::{EvalError, ExecutionOutcome, Result};
pub use engine::{
    Engine, DATA_MODE_READ_FAILED, DATA_MODE_REAL, DATA_MODE_SIMULATED, DATA_MODE_SYNTHETIC,
};
pub use evaluate::{
    evaluate_pair, evaluate_pair_with, Aggregate, PairMetrics, QualityScorer, PSNR_CAP_DB,
};
pub use metrics::Metrics;
pub use params::{sanitize, ParamKind, ParamSpec, ParamValue, Preset, SanitizedParams};
pub use seed::{fallback_niqe, round_to, run_seed, simulated_metrics, stable_seed};
pub use synthetic::{synthesize, SyntheticPair};
pub use telemetry::init_tracing;

pub use resteval_state::{
    FsRunStore, MemoryRunStore, RunId, RunParams, RunRecord, RunStatus, RunStore, SampleResult,
    StorageError, TaskType,
};
