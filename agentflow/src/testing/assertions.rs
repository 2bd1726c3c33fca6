//! Test assertions for steps, snapshots and results.

use crate::core::{PipelineResult, PipelineState, StepResult, StepStatus};

/// Asserts that the step completed with the expected output.
pub fn assert_step_completed(step: &StepResult, expected_output: &str) {
    assert_eq!(
        step.status(),
        StepStatus::Completed,
        "Expected stage '{}' to complete, got status: {:?}",
        step.stage_name(),
        step.status()
    );
    assert_eq!(step.output(), Some(expected_output));
}

/// Asserts that the step failed with the expected error text.
pub fn assert_step_failed(step: &StepResult, expected_error: &str) {
    assert_eq!(
        step.status(),
        StepStatus::Failed,
        "Expected stage '{}' to fail, got status: {:?}",
        step.stage_name(),
        step.status()
    );
    assert_eq!(step.error(), Some(expected_error));
    assert!(step.output().is_none(), "Failed step must not carry output");
}

/// Asserts that the step was cancelled.
pub fn assert_step_cancelled(step: &StepResult) {
    assert_eq!(
        step.status(),
        StepStatus::Cancelled,
        "Expected stage '{}' to be cancelled, got status: {:?}",
        step.stage_name(),
        step.status()
    );
    assert!(step.output().is_none(), "Cancelled step must not carry output");
}

/// Asserts the stage names of `steps`, in order.
pub fn assert_stage_order(steps: &[StepResult], expected: &[&str]) {
    let actual: Vec<&str> = steps.iter().map(StepResult::stage_name).collect();
    assert_eq!(actual, expected, "Unexpected stage order");
}

/// Asserts the invariants every published snapshot must hold.
pub fn assert_snapshot_consistent(state: &PipelineState) {
    let completed = state.completed_steps.len();
    assert!(
        completed <= state.total_steps,
        "Snapshot records {completed} steps but the pipeline has {}",
        state.total_steps
    );
    let expected_progress = if state.total_steps == 0 {
        0
    } else {
        completed * 100 / state.total_steps
    };
    assert_eq!(state.progress_percentage(), expected_progress);
    if let Some(index) = state.current_step_index {
        assert!(
            index < state.total_steps,
            "Current index {index} out of range for {} steps",
            state.total_steps
        );
    }
    if !state.is_running {
        assert!(
            state.current_step.is_none(),
            "Stopped snapshot must not have a step in flight"
        );
    }
}

/// Asserts that the run succeeded with the expected final output.
pub fn assert_run_succeeded(result: &PipelineResult, expected_output: &str) {
    assert!(
        result.success,
        "Expected run to succeed, got error: {:?}",
        result.error
    );
    assert_eq!(result.final_output, expected_output);
    assert!(result.error.is_none());
}

/// Asserts that the run failed with the expected error text.
pub fn assert_run_failed(result: &PipelineResult, expected_error: &str) {
    assert!(!result.success, "Expected run to fail");
    assert_eq!(result.error.as_deref(), Some(expected_error));
    assert!(
        result.final_output.is_empty(),
        "Failed run must not carry output"
    );
}
