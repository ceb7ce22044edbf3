//! Engine configuration: dataset root, sample limit, pacing and fallback size.
//!
//! Defaults can be overridden from `RESTEVAL_*` environment variables; the
//! worker binary layers its command-line flags on top.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding `<dataset_id>/{gt,hazy,noisy,...}`
    pub data_root: PathBuf,
    /// Maximum number of pairs evaluated per run
    pub sample_limit: usize,
    /// Minimum wall time of an execution, spent in cancellable slices
    pub min_duration: Duration,
    /// Slice length of the pacing sleep (cancellation latency)
    pub cancel_poll: Duration,
    /// Synthetic fallback size as (height, width)
    pub synthetic_size: (u32, u32),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            sample_limit: 5,
            min_duration: Duration::from_millis(1600),
            cancel_poll: Duration::from_millis(200),
            synthetic_size: (360, 640),
        }
    }
}

impl EngineConfig {
    /// Create from environment variables
    ///
    /// Reads (all optional, malformed values keep the default):
    /// - RESTEVAL_DATA_ROOT
    /// - RESTEVAL_SAMPLE_LIMIT
    /// - RESTEVAL_MIN_SECONDS (pacing floor, fractional seconds)
    /// - RESTEVAL_CANCEL_POLL_MS
    /// - RESTEVAL_SYNTHETIC_HEIGHT / RESTEVAL_SYNTHETIC_WIDTH
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(root) = parsed("RESTEVAL_DATA_ROOT").filter(|v| !v.is_empty()) {
            cfg.data_root = PathBuf::from(root);
        }
        if let Some(n) = parsed("RESTEVAL_SAMPLE_LIMIT").and_then(|v| v.parse::<usize>().ok()) {
            cfg.sample_limit = n.max(1);
        }
        if let Some(secs) = parsed("RESTEVAL_MIN_SECONDS").and_then(|v| v.parse::<f64>().ok()) {
            match Duration::try_from_secs_f64(secs) {
                Ok(floor) => cfg.min_duration = floor,
                Err(e) => warn!(value = secs, error = %e, "ignoring RESTEVAL_MIN_SECONDS"),
            }
        }
        if let Some(ms) = parsed("RESTEVAL_CANCEL_POLL_MS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.cancel_poll = Duration::from_millis(ms.max(1));
        }
        if let Some(h) = parsed("RESTEVAL_SYNTHETIC_HEIGHT").and_then(|v| v.parse::<u32>().ok()) {
            cfg.synthetic_size.0 = h.max(8);
        }
        if let Some(w) = parsed("RESTEVAL_SYNTHETIC_WIDTH").and_then(|v| v.parse::<u32>().ok()) {
            cfg.synthetic_size.1 = w.max(8);
        }
        cfg
    }

    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit.max(1);
        self
    }

    pub fn with_min_duration(mut self, min_duration: Duration) -> Self {
        self.min_duration = min_duration;
        self
    }

    pub fn with_cancel_poll(mut self, poll: Duration) -> Self {
        self.cancel_poll = poll.max(Duration::from_millis(1));
        self
    }

    pub fn with_synthetic_size(mut self, height: u32, width: u32) -> Self {
        self.synthetic_size = (height.max(8), width.max(8));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.data_root, PathBuf::from("./data"));
        assert_eq!(cfg.sample_limit, 5);
        assert_eq!(cfg.min_duration, Duration::from_millis(1600));
        assert_eq!(cfg.synthetic_size, (360, 640));
    }

    #[test]
    fn test_lookup_overrides() {
        let env: HashMap<&str, &str> = [
            ("RESTEVAL_DATA_ROOT", "/srv/datasets"),
            ("RESTEVAL_SAMPLE_LIMIT", "3"),
            ("RESTEVAL_MIN_SECONDS", "0.25"),
            ("RESTEVAL_CANCEL_POLL_MS", "50"),
            ("RESTEVAL_SYNTHETIC_HEIGHT", "64"),
        ]
        .into_iter()
        .collect();
        let cfg = EngineConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.data_root, PathBuf::from("/srv/datasets"));
        assert_eq!(cfg.sample_limit, 3);
        assert_eq!(cfg.min_duration, Duration::from_millis(250));
        assert_eq!(cfg.cancel_poll, Duration::from_millis(50));
        assert_eq!(cfg.synthetic_size, (64, 640));
    }

    #[test]
    fn test_malformed_values_keep_defaults() {
        let cfg = EngineConfig::from_lookup(|k| match k {
            "RESTEVAL_SAMPLE_LIMIT" => Some("many".into()),
            "RESTEVAL_MIN_SECONDS" => Some("-1".into()),
            _ => None,
        });
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_out_of_range_pacing_floor_keeps_default() {
        for raw in ["1e30", "inf", "NaN"] {
            let cfg = EngineConfig::from_lookup(|k| (k == "RESTEVAL_MIN_SECONDS").then(|| raw.into()));
            assert_eq!(cfg.min_duration, Duration::from_millis(1600), "{raw}");
        }
    }
}
