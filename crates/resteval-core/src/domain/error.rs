//! Error taxonomy for run execution.

use resteval_state::StorageError;

/// Closed set of failures a run can end with.
///
/// Only [`EvalError::record_message`] turns these into the
/// `"<kind>: <message>"` strings stored on a failed run.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("run not found: {run_id}")]
    NotFound { run_id: String },

    #[error("canceled")]
    Canceled,

    #[error("no readable pairs in dataset {dataset_id} ({input_dir} vs gt)")]
    DataAbsent {
        dataset_id: String,
        input_dir: String,
    },

    #[error("{metric} failed: {reason}")]
    MetricFailure { metric: String, reason: String },

    #[error("{message}")]
    Unexpected { kind: String, message: String },
}

impl EvalError {
    pub fn metric(metric: &str, reason: impl Into<String>) -> Self {
        EvalError::MetricFailure {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unexpected(kind: &str, message: impl Into<String>) -> Self {
        EvalError::Unexpected {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// Stable kind name used as the prefix of persisted error strings.
    pub fn kind(&self) -> &str {
        match self {
            EvalError::NotFound { .. } => "NotFound",
            EvalError::Canceled => "Canceled",
            EvalError::DataAbsent { .. } => "DataAbsent",
            EvalError::MetricFailure { .. } => "MetricFailure",
            EvalError::Unexpected { kind, .. } => kind,
        }
    }

    /// `"<kind>: <message>"`, the form written to `RunRecord::error`.
    pub fn record_message(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<StorageError> for EvalError {
    fn from(e: StorageError) -> Self {
        EvalError::unexpected("StorageError", e.to_string())
    }
}

impl From<image::ImageError> for EvalError {
    fn from(e: image::ImageError) -> Self {
        EvalError::unexpected("ImageError", e.to_string())
    }
}

impl From<std::io::Error> for EvalError {
    fn from(e: std::io::Error) -> Self {
        EvalError::unexpected("IoError", e.to_string())
    }
}

impl From<tokio::task::JoinError> for EvalError {
    fn from(e: tokio::task::JoinError) -> Self {
        EvalError::unexpected("JoinError", e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EvalError>;
