//! Per-pair evaluation and aggregation across pairs.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use image::RgbImage;
use tracing::warn;

use resteval_state::SampleResult;

use crate::dispatch::{apply, AlgorithmSpec, TransformContext};
use crate::domain::Result;
use crate::params::SanitizedParams;
use crate::seed::{fallback_niqe, round_to};
use crate::vision::{match_size, niqe_score, psnr, ssim};

pub const PSNR: &str = "PSNR";
pub const SSIM: &str = "SSIM";
pub const NIQE: &str = "NIQE";

/// Ceiling for persisted PSNR values; JSON has no infinity.
pub const PSNR_CAP_DB: f64 = 100.0;

/// Metrics of one prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairMetrics {
    pub psnr: f64,
    pub ssim: f64,
    pub niqe: f64,
    pub niqe_fallback: bool,
    pub algo_elapsed: Duration,
}

/// No-reference scorer applied to each prediction.
pub type QualityScorer = fn(&RgbImage) -> Result<f64>;

/// Predict with `spec`, align ground truth to the prediction, then score.
///
/// PSNR/SSIM failures propagate; a NIQE failure is replaced by the seeded
/// fallback and flagged.
pub fn evaluate_pair(
    spec: &AlgorithmSpec,
    params: &SanitizedParams,
    input: &RgbImage,
    gt: &RgbImage,
    seed: u64,
) -> Result<PairMetrics> {
    evaluate_pair_with(spec, params, input, gt, seed, niqe_score)
}

/// [`evaluate_pair`] with an explicit no-reference scorer.
pub fn evaluate_pair_with(
    spec: &AlgorithmSpec,
    params: &SanitizedParams,
    input: &RgbImage,
    gt: &RgbImage,
    seed: u64,
    scorer: QualityScorer,
) -> Result<PairMetrics> {
    let ctx = TransformContext {
        reference_size: Some(gt.dimensions()),
    };
    let started = Instant::now();
    let pred = apply(spec, params, input, &ctx);
    let algo_elapsed = started.elapsed();

    let gt = match_size(gt, &pred);
    let psnr = psnr(&pred, &gt)?;
    let ssim = ssim(&pred, &gt)?;
    let (niqe, niqe_fallback) = match scorer(&pred) {
        Ok(score) => (score, false),
        Err(e) => {
            warn!(error = %e, "NIQE failed, using seeded fallback");
            (fallback_niqe(seed), true)
        }
    };

    Ok(PairMetrics {
        psnr,
        ssim,
        niqe,
        niqe_fallback,
        algo_elapsed,
    })
}

/// Running collection of evaluated pairs.
#[derive(Debug, Default)]
pub struct Aggregate {
    samples: Vec<(String, PairMetrics)>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, metrics: PairMetrics) {
        self.samples.push((name.into(), metrics));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn any_niqe_fallback(&self) -> bool {
        self.samples.iter().any(|(_, m)| m.niqe_fallback)
    }

    /// Mean algorithm time in seconds, rounded to milliseconds.
    pub fn mean_algo_elapsed(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .samples
            .iter()
            .map(|(_, m)| m.algo_elapsed.as_secs_f64())
            .sum();
        round_to(total / self.samples.len() as f64, 3)
    }

    /// Rounded means (PSNR 3, SSIM 4, NIQE 3 decimals) and per-pair rows.
    pub fn finish(&self) -> (BTreeMap<String, f64>, Vec<SampleResult>) {
        let n = self.samples.len().max(1) as f64;
        let (mut p, mut s, mut q) = (0.0, 0.0, 0.0);
        let mut rows = Vec::with_capacity(self.samples.len());
        for (name, m) in &self.samples {
            let capped = m.psnr.min(PSNR_CAP_DB);
            p += capped;
            s += m.ssim;
            q += m.niqe;
            rows.push(SampleResult {
                name: name.clone(),
                psnr: round_to(capped, 3),
                ssim: round_to(m.ssim, 4),
                niqe: round_to(m.niqe, 3),
            });
        }
        let metrics = BTreeMap::from([
            (PSNR.to_string(), round_to(p / n, 3)),
            (SSIM.to_string(), round_to(s / n, 4)),
            (NIQE.to_string(), round_to(q / n, 3)),
        ]);
        (metrics, rows)
    }
}
