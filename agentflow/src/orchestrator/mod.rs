//! Sequential pipeline execution.
//!
//! An [`Orchestrator`] runs every stage of a [`PipelineDefinition`] in order,
//! feeding each stage the output of the previous one. Progress is exposed
//! three ways:
//!
//! - a lazy stream of [`StepResult`]s from [`Orchestrator::run_streaming`]
//! - the latest [`PipelineState`] snapshot from [`Orchestrator::current_state`]
//! - synchronous observer callbacks registered with [`Orchestrator::subscribe`]
//!
//! Stage failures are data, not errors: a failed or cancelled stage ends the
//! run with a corresponding step and never surfaces as `Err`.

mod observers;
mod run;

#[cfg(test)]
mod orchestrator_tests;

pub use observers::{StateObserver, Subscription};

use crate::cancellation::CancellationToken;
use crate::config::OrchestratorConfig;
use crate::core::{PipelineResult, PipelineState, StepResult};
use crate::errors::AgentflowError;
use crate::generation::{ChatMessage, GenerationClient, GenerationError, OutputBuffer};
use crate::observability::{run_span, SpanTimer};
use crate::pipeline::PipelineDefinition;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use observers::ObserverRegistry;
use parking_lot::{Mutex, RwLock};
use run::RunCursor;
use std::sync::Arc;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

/// Drives a pipeline through a generation client, one stage at a time.
///
/// An orchestrator supports one active run at a time. Starting a second run
/// while one is in flight is not supported: the snapshots of both runs would
/// interleave and [`cancel`](Self::cancel) would only reach the newer one.
pub struct Orchestrator {
    pipeline: Arc<PipelineDefinition>,
    client: Arc<dyn GenerationClient>,
    config: OrchestratorConfig,
    state: RwLock<Arc<PipelineState>>,
    active_token: Mutex<Option<Arc<CancellationToken>>>,
    observers: Arc<ObserverRegistry>,
}

impl Orchestrator {
    /// Creates an orchestrator with the default configuration.
    pub fn new(
        pipeline: impl Into<Arc<PipelineDefinition>>,
        client: Arc<dyn GenerationClient>,
    ) -> Self {
        let pipeline = pipeline.into();
        let state = Arc::new(PipelineState::initial(pipeline.len()));
        Self {
            pipeline,
            client,
            config: OrchestratorConfig::default(),
            state: RwLock::new(state),
            active_token: Mutex::new(None),
            observers: ObserverRegistry::new(),
        }
    }

    /// Creates an orchestrator with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentflowError::Config`] if the configuration is invalid.
    pub fn with_config(
        pipeline: impl Into<Arc<PipelineDefinition>>,
        client: Arc<dyn GenerationClient>,
        config: OrchestratorConfig,
    ) -> Result<Self, AgentflowError> {
        config.validate()?;
        let mut orchestrator = Self::new(pipeline, client);
        orchestrator.config = config;
        Ok(orchestrator)
    }

    /// Returns the pipeline being executed.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the latest published snapshot.
    #[must_use]
    pub fn current_state(&self) -> Arc<PipelineState> {
        Arc::clone(&self.state.read())
    }

    /// Registers an observer called synchronously with every new snapshot.
    ///
    /// A panicking observer is logged and skipped; it does not affect the run
    /// or the other observers.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&PipelineState) + Send + Sync + 'static,
    {
        self.observers.subscribe(Arc::new(observer))
    }

    /// Requests cancellation of the active run, if any.
    ///
    /// Returns immediately. The run stops at its next suspension point and
    /// reports the interrupted stage as cancelled.
    pub fn cancel(&self) {
        let token = self.active_token.lock().clone();
        match token {
            Some(token) => {
                info!("Cancelling active pipeline run");
                token.cancel("cancel requested");
            }
            None => debug!("Cancel requested with no active run"),
        }
    }

    /// Runs the pipeline lazily, yielding one step per stage transition.
    ///
    /// Nothing executes until the stream is polled. The stream ends after the
    /// last stage completes, or right after the first failed or cancelled
    /// step. Dropping the stream early ends the run as cancelled. `cancel`
    /// is linked to the run, so cancelling it has the same effect as
    /// [`Orchestrator::cancel`].
    pub fn run_streaming(
        &self,
        input: impl Into<String>,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, StepResult> {
        self.stream_run(Uuid::new_v4(), input.into(), cancel)
    }

    /// Runs the pipeline to the end and aggregates the outcome.
    pub async fn run(&self, input: impl Into<String>, cancel: &CancellationToken) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = SpanTimer::start("pipeline.run");

        let mut steps_stream = self.stream_run(run_id, input.into(), cancel);
        let mut steps: Vec<StepResult> = Vec::with_capacity(self.pipeline.len());
        while let Some(step) = steps_stream.next().await {
            steps.push(step);
        }
        drop(steps_stream);

        let total_duration = timer.finish();
        let last = steps.last();
        if let Some(step) = last.filter(|s| s.is_failed()) {
            let error = step.error().unwrap_or("Unknown error").to_string();
            return PipelineResult::failed(run_id, started_at, error, steps, total_duration);
        }
        if last.is_some_and(StepResult::is_cancelled) {
            return PipelineResult::failed(
                run_id,
                started_at,
                "Pipeline cancelled",
                steps,
                total_duration,
            );
        }

        let final_output = last.and_then(StepResult::output).unwrap_or_default().to_string();
        PipelineResult::successful(run_id, started_at, final_output, steps, total_duration)
    }

    fn stream_run(
        &self,
        run_id: Uuid,
        input: String,
        cancel: &CancellationToken,
    ) -> BoxStream<'_, StepResult> {
        let token = CancellationToken::child_of(cancel);
        *self.active_token.lock() = Some(Arc::clone(&token));

        let span = run_span(run_id, self.pipeline.len());
        let cursor = RunCursor::new(self, run_id, input, token, span);

        stream::unfold(cursor, |mut cursor| async move {
            let span = cursor.span();
            let step = cursor.advance().instrument(span).await?;
            Some((step, cursor))
        })
        .fuse()
        .boxed()
    }

    /// Calls the generation client, buffering fragments when streaming is
    /// enabled.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let max_output_tokens = self.config.max_output_tokens;
        if !self.config.streaming {
            return self.client.complete(messages, max_output_tokens).await;
        }

        let fragments = self
            .client
            .complete_streaming(messages, max_output_tokens)
            .await?;
        let mut buffer = OutputBuffer::new(self.config.max_buffered_output_bytes);
        buffer.fill(fragments).await?;
        Ok(buffer.into_string())
    }

    /// Replaces the snapshot, then notifies observers.
    fn publish(&self, state: PipelineState) {
        let state = Arc::new(state);
        *self.state.write() = Arc::clone(&state);
        debug!(
            run_id = ?state.run_id,
            running = state.is_running,
            step = ?state.current_step_index,
            completed = state.completed_steps.len(),
            total = state.total_steps,
            "Published pipeline state"
        );
        self.observers.notify(&state);
    }

    /// Clears the active token if it still belongs to the finishing run.
    fn release_token(&self, token: &Arc<CancellationToken>) {
        let mut active = self.active_token.lock();
        if active.as_ref().is_some_and(|current| Arc::ptr_eq(current, token)) {
            *active = None;
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("stages", &self.pipeline.len())
            .field("config", &self.config)
            .field("state", &self.current_state())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}
