//! Persisted run record and its lifecycle transitions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::RunId;

/// Algorithm parameters and engine annotations (`data_mode`, `real_algo`, ...).
pub type RunParams = BTreeMap<String, serde_json::Value>;

/// Restoration task a run evaluates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Denoise,
    Deblur,
    Dehaze,
    #[serde(alias = "super_resolution")]
    Sr,
    #[serde(alias = "low_light")]
    Lowlight,
    VideoDenoise,
    VideoSr,
}

impl TaskType {
    /// Stable lowercase name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Denoise => "denoise",
            TaskType::Deblur => "deblur",
            TaskType::Dehaze => "dehaze",
            TaskType::Sr => "sr",
            TaskType::Lowlight => "lowlight",
            TaskType::VideoDenoise => "video_denoise",
            TaskType::VideoSr => "video_sr",
        }
    }

    /// Dataset subdirectory holding this task's degraded inputs.
    pub fn input_dir(&self) -> &'static str {
        match self {
            TaskType::Denoise | TaskType::VideoDenoise => "noisy",
            TaskType::Deblur => "blur",
            TaskType::Dehaze => "hazy",
            TaskType::Sr | TaskType::VideoSr => "lr",
            TaskType::Lowlight => "dark",
        }
    }

    /// Whether the engine evaluates this task on still images.
    pub fn is_image_task(&self) -> bool {
        !matches!(self, TaskType::VideoDenoise | TaskType::VideoSr)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "denoise" => Ok(TaskType::Denoise),
            "deblur" => Ok(TaskType::Deblur),
            "dehaze" => Ok(TaskType::Dehaze),
            "sr" | "super_resolution" => Ok(TaskType::Sr),
            "lowlight" | "low_light" => Ok(TaskType::Lowlight),
            "video_denoise" => Ok(TaskType::VideoDenoise),
            "video_sr" => Ok(TaskType::VideoSr),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// Lifecycle status of a run.
///
/// `queued → running → {done | failed | canceled}`; `canceling` marks a
/// running run whose cancellation has been requested but not yet observed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Canceling,
    Canceled,
    Done,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed | RunStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Canceling => "canceling",
            RunStatus::Canceled => "canceled",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics of one evaluated (input, ground truth) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleResult {
    pub name: String,
    #[serde(rename = "PSNR")]
    pub psnr: f64,
    #[serde(rename = "SSIM")]
    pub ssim: f64,
    #[serde(rename = "NIQE")]
    pub niqe: f64,
}

/// One evaluation job as stored by a [`crate::RunStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: RunId,
    pub task_type: TaskType,
    pub dataset_id: String,
    pub algorithm_id: String,

    #[serde(default)]
    pub params: RunParams,

    #[serde(default)]
    pub strict_validate: bool,

    #[serde(default)]
    pub cancel_requested: bool,

    pub status: RunStatus,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,

    /// Seconds between start (or creation, if never started) and finish,
    /// rounded to milliseconds.
    #[serde(default)]
    pub elapsed: Option<f64>,

    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,

    #[serde(default)]
    pub samples: Vec<SampleResult>,

    #[serde(default)]
    pub error: Option<String>,
}

impl RunRecord {
    /// Create a new run in `queued` state with a generated id.
    pub fn queued(
        task_type: TaskType,
        dataset_id: impl Into<String>,
        algorithm_id: impl Into<String>,
        params: RunParams,
    ) -> Self {
        Self::queued_with_id(RunId::new(), task_type, dataset_id, algorithm_id, params)
    }

    /// Create a new `queued` run under a caller-chosen id.
    pub fn queued_with_id(
        run_id: RunId,
        task_type: TaskType,
        dataset_id: impl Into<String>,
        algorithm_id: impl Into<String>,
        params: RunParams,
    ) -> Self {
        Self {
            run_id,
            task_type,
            dataset_id: dataset_id.into(),
            algorithm_id: algorithm_id.into(),
            params,
            strict_validate: false,
            cancel_requested: false,
            status: RunStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            elapsed: None,
            metrics: BTreeMap::new(),
            samples: Vec::new(),
            error: None,
        }
    }

    /// Require real dataset pairs for this run.
    pub fn strict(mut self) -> Self {
        self.strict_validate = true;
        self
    }

    /// Whether a cancellation request is pending or already applied.
    pub fn cancellation_pending(&self) -> bool {
        self.cancel_requested || matches!(self.status, RunStatus::Canceling | RunStatus::Canceled)
    }

    /// Transition to `running`, stamping the start time and clearing any error.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = RunStatus::Running;
        self.started_at = Some(now);
        self.error = None;
    }

    /// Terminal success: metrics and samples are written in the same step
    /// as the status so no reader sees `done` without them.
    pub fn finish_done(
        &mut self,
        now: DateTime<Utc>,
        metrics: BTreeMap<String, f64>,
        samples: Vec<SampleResult>,
        params_patch: RunParams,
    ) {
        self.params.extend(params_patch);
        self.metrics = metrics;
        self.samples = samples;
        self.error = None;
        self.close(RunStatus::Done, now);
    }

    /// Terminal failure with a `"<kind>: <message>"` error string.
    pub fn finish_failed(&mut self, now: DateTime<Utc>, error: impl Into<String>) {
        self.error = Some(error.into());
        self.close(RunStatus::Failed, now);
    }

    /// Terminal cancellation. Any partial metrics are discarded.
    pub fn finish_canceled(&mut self, now: DateTime<Utc>, reason: impl Into<String>) {
        self.cancel_requested = true;
        self.metrics.clear();
        self.samples.clear();
        self.error = Some(reason.into());
        self.close(RunStatus::Canceled, now);
    }

    fn close(&mut self, status: RunStatus, now: DateTime<Utc>) {
        let origin = self.started_at.unwrap_or(self.created_at);
        let finished = now.max(origin);
        let micros = (finished - origin)
            .num_microseconds()
            .unwrap_or(i64::MAX)
            .max(0);
        self.status = status;
        self.finished_at = Some(finished);
        self.elapsed = Some((micros as f64 / 1000.0).round() / 1000.0);
    }
}
