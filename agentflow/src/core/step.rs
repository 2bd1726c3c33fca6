//! Per-stage outcome value type.

use super::{duration_ms, StepStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Approximate characters per token used by [`estimate_tokens`].
pub const CHARS_PER_TOKEN: usize = 4;

/// Coarse token estimate for a piece of text.
///
/// This is a proxy for resource usage, not a billed count.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Token estimate for one stage call: its input and output taken together.
#[must_use]
pub fn estimate_step_tokens(input: &str, output: &str) -> usize {
    (input.chars().count() + output.chars().count()) / CHARS_PER_TOKEN
}

/// The outcome of one stage transition.
///
/// A `StepResult` is never updated in place: every transition of a stage
/// produces a fresh value through one of the factory methods, which keep
/// `output` present only for completed steps and `error` present only for
/// failed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    stage_name: String,
    status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    duration: Duration,
    #[serde(default)]
    tokens_used: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StepResult {
    /// Creates a pending step.
    #[must_use]
    pub fn pending(stage_name: impl Into<String>) -> Self {
        Self::bare(stage_name, StepStatus::Pending)
    }

    /// Creates a running step.
    #[must_use]
    pub fn running(stage_name: impl Into<String>) -> Self {
        Self::bare(stage_name, StepStatus::Running)
    }

    /// Creates a completed step with output.
    #[must_use]
    pub fn completed(
        stage_name: impl Into<String>,
        output: impl Into<String>,
        duration: Duration,
        tokens_used: usize,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            status: StepStatus::Completed,
            output: Some(output.into()),
            duration,
            tokens_used,
            error: None,
        }
    }

    /// Creates a failed step with an error message.
    #[must_use]
    pub fn failed(stage_name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            stage_name: stage_name.into(),
            status: StepStatus::Failed,
            output: None,
            duration,
            tokens_used: 0,
            error: Some(error.into()),
        }
    }

    /// Creates a cancelled step.
    #[must_use]
    pub fn cancelled(stage_name: impl Into<String>) -> Self {
        Self::bare(stage_name, StepStatus::Cancelled)
    }

    fn bare(stage_name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            stage_name: stage_name.into(),
            status,
            output: None,
            duration: Duration::ZERO,
            tokens_used: 0,
            error: None,
        }
    }

    /// Returns the name of the stage this step belongs to.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the step status.
    #[must_use]
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Returns the stage output, present only when completed.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Returns the elapsed time of the stage.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the estimated token usage.
    #[must_use]
    pub fn tokens_used(&self) -> usize {
        self.tokens_used
    }

    /// Returns the error message, present only when failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true if the step completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }

    /// Returns true if the step failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    /// Returns true if the step was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == StepStatus::Cancelled
    }
}
