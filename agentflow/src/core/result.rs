//! Terminal aggregate of a pipeline run.

use super::{duration_ms, StepResult, StepStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// The final result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// The run this result belongs to.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Whether every stage completed.
    pub success: bool,
    /// Output of the last stage, empty on failure.
    pub final_output: String,
    /// Every step emitted during the run, in stage order.
    pub steps: Vec<StepResult>,
    /// Wall-clock time of the whole run.
    #[serde(rename = "total_duration_ms", with = "duration_ms")]
    pub total_duration: Duration,
    /// Error message if the run did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResult {
    /// Creates a successful result.
    #[must_use]
    pub fn successful(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        final_output: impl Into<String>,
        steps: Vec<StepResult>,
        total_duration: Duration,
    ) -> Self {
        Self {
            run_id,
            started_at,
            success: true,
            final_output: final_output.into(),
            steps,
            total_duration,
            error: None,
        }
    }

    /// Creates a failed result. The final output is always empty.
    #[must_use]
    pub fn failed(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
        steps: Vec<StepResult>,
        total_duration: Duration,
    ) -> Self {
        Self {
            run_id,
            started_at,
            success: false,
            final_output: String::new(),
            steps,
            total_duration,
            error: Some(error.into()),
        }
    }

    /// Returns the estimated tokens used across all steps.
    #[must_use]
    pub fn total_tokens_used(&self) -> usize {
        self.steps.iter().map(StepResult::tokens_used).sum()
    }

    /// Returns the output of the first step recorded for `stage_name`.
    #[must_use]
    pub fn stage_output(&self, stage_name: &str) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| s.stage_name() == stage_name)
            .and_then(StepResult::output)
    }

    /// Returns true if the run stopped because it was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.steps
            .last()
            .is_some_and(|s| s.status() == StepStatus::Cancelled)
    }
}
