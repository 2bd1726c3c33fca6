//! Per-run execution cursor driven by the step stream.

use super::Orchestrator;
use crate::cancellation::CancellationToken;
use crate::core::{estimate_step_tokens, PipelineState, StepResult};
use crate::generation::GenerationError;
use crate::observability::{stage_span, SpanTimer};
use crate::pipeline::{StageDefinition, StagePrompt};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument, Span};
use uuid::Uuid;

enum StageOutcome {
    Completed(String),
    Failed(GenerationError),
    Cancelled,
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Finished,
}

/// State carried between polls of a streaming run.
///
/// The cursor owns the running input and the steps recorded so far. Each
/// call to [`advance`](Self::advance) executes at most one stage.
pub(crate) struct RunCursor<'a> {
    orchestrator: &'a Orchestrator,
    run_id: Uuid,
    token: Arc<CancellationToken>,
    original_input: String,
    current_input: String,
    next_index: usize,
    completed: Vec<StepResult>,
    phase: Phase,
    span: Span,
}

impl<'a> RunCursor<'a> {
    pub(crate) fn new(
        orchestrator: &'a Orchestrator,
        run_id: Uuid,
        input: String,
        token: Arc<CancellationToken>,
        span: Span,
    ) -> Self {
        Self {
            orchestrator,
            run_id,
            token,
            current_input: input.clone(),
            original_input: input,
            next_index: 0,
            completed: Vec::new(),
            phase: Phase::NotStarted,
            span,
        }
    }

    pub(crate) fn span(&self) -> Span {
        self.span.clone()
    }

    fn total(&self) -> usize {
        self.orchestrator.pipeline.len()
    }

    /// Runs the next stage and returns its step, or `None` once the run has
    /// ended.
    pub(crate) async fn advance(&mut self) -> Option<StepResult> {
        match self.phase {
            Phase::Finished => return None,
            Phase::NotStarted => {
                self.phase = Phase::Running;
                info!(
                    run_id = %self.run_id,
                    total_steps = self.total(),
                    "Starting pipeline run"
                );
            }
            Phase::Running => {}
        }

        let orchestrator = self.orchestrator;
        let index = self.next_index;
        let Some(stage) = orchestrator.pipeline.stages().get(index) else {
            self.finish(self.total().checked_sub(1));
            info!(
                run_id = %self.run_id,
                steps = self.completed.len(),
                "Pipeline run completed"
            );
            return None;
        };

        orchestrator.publish(PipelineState::running(
            self.run_id,
            index,
            self.completed.clone(),
            Some(StepResult::running(stage.name())),
            self.total(),
        ));

        let timer = SpanTimer::start(stage.name());
        let outcome = if self.token.is_cancelled() {
            StageOutcome::Cancelled
        } else {
            self.execute_stage(index, stage)
                .instrument(stage_span(stage.name(), index))
                .await
        };

        let step = match outcome {
            StageOutcome::Completed(output) => {
                let duration = timer.finish();
                let tokens = estimate_step_tokens(&self.current_input, &output);
                info!(
                    run_id = %self.run_id,
                    stage = stage.name(),
                    step = index,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    tokens,
                    "Stage completed"
                );
                let step = StepResult::completed(stage.name(), output.clone(), duration, tokens);
                self.current_input = output;
                self.completed.push(step.clone());
                self.next_index += 1;
                orchestrator.publish(PipelineState::running(
                    self.run_id,
                    index,
                    self.completed.clone(),
                    None,
                    self.total(),
                ));
                step
            }
            StageOutcome::Failed(err) => {
                let duration = timer.finish();
                error!(
                    run_id = %self.run_id,
                    stage = stage.name(),
                    step = index,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Stage failed"
                );
                let step = StepResult::failed(stage.name(), err.to_string(), duration);
                self.completed.push(step.clone());
                self.finish(Some(index));
                step
            }
            StageOutcome::Cancelled => {
                warn!(
                    run_id = %self.run_id,
                    stage = stage.name(),
                    step = index,
                    reason = ?self.token.reason(),
                    "Stage cancelled"
                );
                let step = StepResult::cancelled(stage.name());
                self.completed.push(step.clone());
                self.finish(Some(index));
                step
            }
        };

        Some(step)
    }

    /// Calls the generation client for one stage, racing the cancellation
    /// signal.
    async fn execute_stage(&self, index: usize, stage: &StageDefinition) -> StageOutcome {
        let prompt = StagePrompt::for_step(index, &self.original_input, &self.current_input);
        let messages = prompt.messages(stage);

        tokio::select! {
            biased;
            () = self.token.cancelled() => StageOutcome::Cancelled,
            result = self.orchestrator.generate(&messages) => match result {
                Ok(output) => StageOutcome::Completed(output),
                Err(err) => StageOutcome::Failed(err),
            },
        }
    }

    /// Publishes the terminal snapshot and releases the run's token.
    fn finish(&mut self, index: Option<usize>) {
        self.phase = Phase::Finished;
        self.orchestrator.publish(PipelineState::stopped(
            self.run_id,
            index,
            self.completed.clone(),
            self.total(),
        ));
        self.orchestrator.release_token(&self.token);
    }
}

impl Drop for RunCursor<'_> {
    /// A stream dropped mid-run counts as cancelled at the next stage, so the
    /// published snapshot never stays marked as running.
    fn drop(&mut self) {
        match self.phase {
            Phase::Finished => {}
            Phase::NotStarted => self.orchestrator.release_token(&self.token),
            Phase::Running => {
                let index = self.next_index;
                if let Some(stage) = self.orchestrator.pipeline.stages().get(index) {
                    warn!(
                        run_id = %self.run_id,
                        stage = stage.name(),
                        step = index,
                        "Step stream dropped before the run ended"
                    );
                    self.completed.push(StepResult::cancelled(stage.name()));
                    self.finish(Some(index));
                } else {
                    self.finish(self.total().checked_sub(1));
                }
            }
        }
    }
}
