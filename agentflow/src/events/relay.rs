//! Forwards orchestrator snapshots to an event sink.

use super::EventSink;
use crate::core::{PipelineResult, PipelineState, StepResult, StepStatus};
use crate::orchestrator::{Orchestrator, Subscription};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Event emitted for every published snapshot.
pub const STATE_CHANGED: &str = "pipeline.state_changed";
/// Event emitted once per newly completed step.
pub const STEP_COMPLETED: &str = "step.completed";
/// Event emitted with the reconstructed result when a run stops.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";

/// Tracks which parts of the current run were already forwarded.
#[derive(Debug, Default)]
struct RelayCursor {
    run_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    steps_seen: usize,
    finished: bool,
}

/// Observer that relays pipeline progress to an [`EventSink`].
///
/// Every snapshot is forwarded as [`STATE_CHANGED`]. Each step that lands in
/// the completed list with status `Completed` is forwarded once as
/// [`STEP_COMPLETED`], and the terminal snapshot of a run produces a
/// [`PIPELINE_COMPLETED`] event carrying a [`PipelineResult`] rebuilt from
/// the snapshot. Dropping the relay detaches it.
#[derive(Debug)]
pub struct ProgressRelay {
    _subscription: Subscription,
}

impl ProgressRelay {
    /// Subscribes a relay to `orchestrator`.
    pub fn attach(orchestrator: &Orchestrator, sink: Arc<dyn EventSink>) -> Self {
        let cursor = Mutex::new(RelayCursor::default());
        let subscription = orchestrator.subscribe(move |state| {
            relay_state(sink.as_ref(), &mut cursor.lock(), state);
        });
        Self {
            _subscription: subscription,
        }
    }
}

fn relay_state(sink: &dyn EventSink, cursor: &mut RelayCursor, state: &PipelineState) {
    sink.try_emit(STATE_CHANGED, to_payload(state));

    let Some(run_id) = state.run_id else {
        return;
    };
    if cursor.run_id != Some(run_id) {
        *cursor = RelayCursor {
            run_id: Some(run_id),
            started_at: Some(Utc::now()),
            ..RelayCursor::default()
        };
    }

    let new_steps = state.completed_steps.iter().skip(cursor.steps_seen);
    for step in new_steps.filter(|s| s.is_completed()) {
        sink.try_emit(STEP_COMPLETED, to_payload(step));
    }
    cursor.steps_seen = cursor.steps_seen.max(state.completed_steps.len());

    if !state.is_running && !cursor.finished {
        cursor.finished = true;
        let started_at = cursor.started_at.unwrap_or_else(Utc::now);
        let result = rebuild_result(run_id, started_at, &state.completed_steps);
        sink.try_emit(PIPELINE_COMPLETED, to_payload(&result));
    }
}

/// Rebuilds the result of a stopped run from its recorded steps.
///
/// The duration is the sum of step durations, so it excludes time spent
/// between stages.
fn rebuild_result(run_id: Uuid, started_at: DateTime<Utc>, steps: &[StepResult]) -> PipelineResult {
    let total_duration: Duration = steps.iter().map(StepResult::duration).sum();
    let steps = steps.to_vec();

    if let Some(failed) = steps.iter().find(|s| s.is_failed()) {
        let error = failed.error().unwrap_or("Unknown error").to_string();
        return PipelineResult::failed(run_id, started_at, error, steps, total_duration);
    }
    if steps.iter().any(|s| s.status() == StepStatus::Cancelled) {
        return PipelineResult::failed(run_id, started_at, "Pipeline cancelled", steps, total_duration);
    }

    let final_output = steps
        .last()
        .and_then(StepResult::output)
        .unwrap_or_default()
        .to_string();
    PipelineResult::successful(run_id, started_at, final_output, steps, total_duration)
}

fn to_payload<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(error = %e, "Failed to serialize event payload");
            None
        }
    }
}
