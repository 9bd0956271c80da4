//! Per-stage result records.

use super::StageStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result recorded for one stage of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage name.
    pub name: String,
    /// Stage status.
    pub status: StageStatus,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// Result data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResult {
    /// Creates a completed stage result.
    #[must_use]
    pub fn completed(
        name: impl Into<String>,
        started_at: DateTime<Utc>,
        data: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Completed,
            started_at,
            ended_at: Utc::now(),
            data,
            error: None,
        }
    }

    /// Creates a failed stage result.
    #[must_use]
    pub fn failed(
        name: impl Into<String>,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Failed,
            started_at,
            ended_at: Utc::now(),
            data: HashMap::new(),
            error: Some(error.into()),
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, StageStatus::Completed)
    }
}
