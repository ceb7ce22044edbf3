use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What `Engine::execute` reports back to its dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub ok: bool,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(run_id: impl Into<String>, metrics: BTreeMap<String, f64>) -> Self {
        Self {
            ok: true,
            run_id: run_id.into(),
            metrics: Some(metrics),
            error: None,
        }
    }

    pub fn failure(run_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            run_id: run_id.into(),
            metrics: None,
            error: Some(error.into()),
        }
    }
}
