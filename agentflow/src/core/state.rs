//! Point-in-time view of pipeline progress.

use super::{StepResult, StepStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable snapshot of a pipeline run.
///
/// The orchestrator replaces its snapshot wholesale on every transition, so a
/// reader holding a `PipelineState` always sees a consistent view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    /// The run that produced this snapshot, `None` before the first run.
    pub run_id: Option<Uuid>,
    /// Whether the pipeline is currently executing.
    pub is_running: bool,
    /// Zero-based index of the step being executed, `None` before start.
    pub current_step_index: Option<usize>,
    /// Steps that reached a terminal status, in stage order.
    pub completed_steps: Vec<StepResult>,
    /// The step currently in flight, if any.
    pub current_step: Option<StepResult>,
    /// Total number of steps in the pipeline.
    pub total_steps: usize,
}

impl PipelineState {
    /// Creates the idle snapshot published before any run.
    #[must_use]
    pub fn initial(total_steps: usize) -> Self {
        Self {
            run_id: None,
            is_running: false,
            current_step_index: None,
            completed_steps: Vec::new(),
            current_step: None,
            total_steps,
        }
    }

    /// Creates a snapshot of a run with a stage in flight.
    #[must_use]
    pub fn running(
        run_id: Uuid,
        index: usize,
        completed_steps: Vec<StepResult>,
        current_step: Option<StepResult>,
        total_steps: usize,
    ) -> Self {
        Self {
            run_id: Some(run_id),
            is_running: true,
            current_step_index: Some(index),
            completed_steps,
            current_step,
            total_steps,
        }
    }

    /// Creates a terminal snapshot of a run.
    #[must_use]
    pub fn stopped(
        run_id: Uuid,
        index: Option<usize>,
        completed_steps: Vec<StepResult>,
        total_steps: usize,
    ) -> Self {
        Self {
            run_id: Some(run_id),
            is_running: false,
            current_step_index: index,
            completed_steps,
            current_step: None,
            total_steps,
        }
    }

    /// Returns true once the run has stopped with every step recorded.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        !self.is_running && self.completed_steps.len() == self.total_steps
    }

    /// Returns true if any recorded step failed.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.completed_steps
            .iter()
            .any(|s| s.status() == StepStatus::Failed)
    }

    /// Returns the progress percentage (0-100), rounded down.
    #[must_use]
    pub fn progress_percentage(&self) -> usize {
        if self.total_steps == 0 {
            return 0;
        }
        self.completed_steps.len() * 100 / self.total_steps
    }

    /// Returns the most recently recorded step.
    #[must_use]
    pub fn last_step(&self) -> Option<&StepResult> {
        self.completed_steps.last()
    }
}
