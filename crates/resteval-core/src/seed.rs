//! Deterministic per-run seeding.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use resteval_state::RunRecord;

/// First 8 bytes (big-endian) of SHA-256 over `"{run_id}|{task}|{dataset}|{algorithm}"`.
pub fn stable_seed(run_id: &str, task: &str, dataset_id: &str, algorithm_id: &str) -> u64 {
    let digest = Sha256::digest(format!("{run_id}|{task}|{dataset_id}|{algorithm_id}").as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Seed of a stored run.
pub fn run_seed(run: &RunRecord) -> u64 {
    stable_seed(
        run.run_id.as_str(),
        run.task_type.as_str(),
        &run.dataset_id,
        &run.algorithm_id,
    )
}

/// Hex rendering of a seed, as logged on the run span.
pub fn seed_hex(seed: u64) -> String {
    hex::encode(seed.to_be_bytes())
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Seeded stand-in metrics: PSNR in [20, 35), SSIM in [0.70, 0.98),
/// NIQE in [2.5, 6.5), drawn in that order.
pub fn simulated_metrics(seed: u64) -> BTreeMap<String, f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let psnr = round_to(rng.gen_range(20.0..35.0), 3);
    let ssim = round_to(rng.gen_range(0.70..0.98), 4);
    let niqe = round_to(rng.gen_range(2.5..6.5), 3);
    BTreeMap::from([
        ("PSNR".to_string(), psnr),
        ("SSIM".to_string(), ssim),
        ("NIQE".to_string(), niqe),
    ])
}

/// Fallback NIQE used when the estimator fails on a prediction.
pub fn fallback_niqe(seed: u64) -> f64 {
    simulated_metrics(seed)["NIQE"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_stable_and_input_sensitive() {
        let a = stable_seed("run1", "dehaze", "ds_demo", "alg_dehaze_dcp");
        let b = stable_seed("run1", "dehaze", "ds_demo", "alg_dehaze_dcp");
        let c = stable_seed("run2", "dehaze", "ds_demo", "alg_dehaze_dcp");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn seed_matches_digest_prefix() {
        let digest = Sha256::digest(b"r|sr|d|a");
        let expected = hex::encode(&digest[..8]);
        assert_eq!(seed_hex(stable_seed("r", "sr", "d", "a")), expected);
    }

    #[test]
    fn simulated_metrics_in_range() {
        for seed in [0u64, 1, 42, u64::MAX] {
            let m = simulated_metrics(seed);
            assert!((20.0..=35.0).contains(&m["PSNR"]));
            assert!((0.70..=0.98).contains(&m["SSIM"]));
            assert!((2.5..=6.5).contains(&m["NIQE"]));
            assert_eq!(m, simulated_metrics(seed));
        }
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(3.14159, 3), 3.142);
        assert_eq!(round_to(0.98765, 4), 0.9877);
    }
}
