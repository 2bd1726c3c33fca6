//! Tests for the orchestrator.

use super::*;
use crate::core::StepStatus;
use crate::events::{
    CollectingEventSink, LoggingEventSink, ProgressRelay, PIPELINE_COMPLETED, STATE_CHANGED,
    STEP_COMPLETED,
};
use crate::generation::{ChatRole, MockGenerationClient};
use crate::pipeline::{StageDefinition, StagePrompt};
use crate::testing::{
    assert_run_failed, assert_run_succeeded, assert_snapshot_consistent, assert_stage_order,
    assert_step_cancelled, assert_step_completed, assert_step_failed, instructions_for,
    pipeline_of, ScriptedGenerationClient, TestPipeline,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};

const ABC: &[&str] = &["A", "B", "C"];

fn record_states(orchestrator: &Orchestrator) -> (Arc<Mutex<Vec<PipelineState>>>, Subscription) {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    let subscription = orchestrator.subscribe(move |state| sink.lock().push(state.clone()));
    (states, subscription)
}

// ============================================================================
// Blocking runs
// ============================================================================

#[tokio::test]
async fn test_echo_chain_succeeds() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_run_succeeded(&result, "X!!!");
    assert_stage_order(&result.steps, ABC);
    assert_step_completed(&result.steps[0], "X!");
    assert_step_completed(&result.steps[1], "X!!");
    assert_step_completed(&result.steps[2], "X!!!");
    assert_eq!(result.stage_output("B"), Some("X!!"));
    assert_eq!(harness.client.call_count(), 3);
}

#[tokio::test]
async fn test_token_estimate_uses_stage_input_and_output() {
    let harness = TestPipeline::new(&["A", "B"], ScriptedGenerationClient::echo("!!!!"));

    let result = harness
        .orchestrator
        .run("abcdefgh", &CancellationToken::new())
        .await;

    // A: "abcdefgh" (8) + "abcdefgh!!!!" (12) = 20 chars
    // B: "abcdefgh!!!!" (12) + "abcdefgh!!!!!!!!" (16) = 28 chars
    assert_eq!(result.steps[0].tokens_used(), 5);
    assert_eq!(result.steps[1].tokens_used(), 7);
    assert_eq!(result.total_tokens_used(), 12);
}

#[tokio::test]
async fn test_failure_stops_the_run() {
    let client = ScriptedGenerationClient::echo("!")
        .fail_on_instructions(instructions_for("B"), GenerationError::QuotaExceeded("quota exceeded".into()));
    let harness = TestPipeline::new(ABC, client);

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_run_failed(&result, "quota exceeded");
    assert_stage_order(&result.steps, &["A", "B"]);
    assert_step_completed(&result.steps[0], "X!");
    assert_step_failed(&result.steps[1], "quota exceeded");
    assert_eq!(harness.client.call_count(), 2);

    let state = harness.orchestrator.current_state();
    assert!(!state.is_running);
    assert!(state.has_failed());
    assert!(!state.is_completed());
    assert_eq!(state.current_step_index, Some(1));
}

#[tokio::test]
async fn test_failure_on_first_stage() {
    let client = ScriptedGenerationClient::echo("!")
        .fail_on_call(0, GenerationError::Network("connection reset".into()));
    let harness = TestPipeline::new(ABC, client);

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_run_failed(&result, "Network error: connection reset");
    assert_eq!(result.steps.len(), 1);
}

#[tokio::test]
async fn test_empty_pipeline_succeeds_with_empty_output() {
    let harness = TestPipeline::new(&[], ScriptedGenerationClient::echo("!"));
    let (states, _subscription) = record_states(&harness.orchestrator);

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_run_succeeded(&result, "");
    assert!(result.steps.is_empty());
    assert_eq!(harness.client.call_count(), 0);

    let states = states.lock();
    assert_eq!(states.len(), 1);
    assert!(!states[0].is_running);
    assert_eq!(states[0].current_step_index, None);
    assert!(states[0].is_completed());
    assert_eq!(states[0].run_id, Some(result.run_id));
}

#[tokio::test]
async fn test_result_carries_run_id() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_eq!(harness.orchestrator.current_state().run_id, Some(result.run_id));
    assert!(result.started_at <= Utc::now());
}

#[tokio::test]
async fn test_runs_are_repeatable() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let token = CancellationToken::new();

    let first = harness.orchestrator.run("X", &token).await;
    let second = harness.orchestrator.run("Y", &token).await;

    assert_run_succeeded(&first, "X!!!");
    assert_run_succeeded(&second, "Y!!!");
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_finished_runs_leave_no_links_on_shared_token() {
    let harness = TestPipeline::new(&["A"], ScriptedGenerationClient::echo("!"));
    let token = CancellationToken::new();

    for _ in 0..1000 {
        let result = harness.orchestrator.run("X", &token).await;
        assert!(result.success);
    }

    assert_eq!(token.child_count(), 0);
    assert!(token.child_link_count() <= 1);
}

#[tokio::test]
async fn test_shared_token_still_cancels_after_many_runs() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let token = CancellationToken::new();
    for _ in 0..50 {
        harness.orchestrator.run("X", &token).await;
    }

    let mut stream = harness.orchestrator.run_streaming("Y", &token);
    assert!(stream.next().await.is_some());
    token.cancel("stop");

    let steps: Vec<_> = stream.collect().await;
    assert_eq!(steps.last().map(StepResult::status), Some(StepStatus::Cancelled));
    assert!(token.child_link_count() <= 1);
}

// ============================================================================
// Messages sent to the generation client
// ============================================================================

#[tokio::test]
async fn test_chained_messages_carry_original_and_previous() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    harness.orchestrator.run("X", &CancellationToken::new()).await;

    let calls = harness.client.calls();
    assert_eq!(calls.len(), 3);

    assert_eq!(calls[0].instructions(), Some(instructions_for("A").as_str()));
    assert_eq!(
        calls[0].user_message(),
        Some("Please analyze the following:\n\nX")
    );

    for (index, previous) in [(1, "X!"), (2, "X!!")] {
        let call = &calls[index];
        assert_eq!(call.instructions(), Some(instructions_for(ABC[index]).as_str()));
        let prompt = StagePrompt::parse(call.user_message().unwrap()).unwrap();
        assert_eq!(
            prompt,
            StagePrompt::Chained {
                original: "X".to_string(),
                previous: previous.to_string(),
            }
        );
    }
}

#[tokio::test]
async fn test_config_controls_generation_call() {
    let config = OrchestratorConfig::new()
        .with_streaming(false)
        .with_max_output_tokens(123);
    let harness = TestPipeline::with_config(ABC, ScriptedGenerationClient::echo("!"), config);

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_run_succeeded(&result, "X!!!");
    for call in harness.client.calls() {
        assert!(!call.streaming);
        assert_eq!(call.max_output_tokens, 123);
    }
}

#[tokio::test]
async fn test_streamed_output_is_reassembled() {
    let client = ScriptedGenerationClient::echo(" and more").with_fragment_chars(1);
    let harness = TestPipeline::new(&["A"], client);

    let result = harness
        .orchestrator
        .run("fragmented input", &CancellationToken::new())
        .await;

    assert_run_succeeded(&result, "fragmented input and more");
    assert!(harness.client.calls()[0].streaming);
}

#[tokio::test]
async fn test_oversized_stream_fails_stage() {
    let config = OrchestratorConfig::new().with_max_buffered_output_bytes(4);
    let harness = TestPipeline::with_config(ABC, ScriptedGenerationClient::echo("!"), config);

    let result = harness.orchestrator.run("hello", &CancellationToken::new()).await;

    assert_run_failed(&result, "Generated output exceeded 4 bytes");
    assert_eq!(result.steps.len(), 1);
}

#[tokio::test]
async fn test_with_config_rejects_invalid_config() {
    let client: Arc<dyn GenerationClient> = Arc::new(ScriptedGenerationClient::echo("!"));
    let config = OrchestratorConfig::new().with_max_output_tokens(0);

    let err = Orchestrator::with_config(pipeline_of(ABC), client, config).unwrap_err();
    assert!(matches!(err, AgentflowError::Config(_)));
}

#[tokio::test]
async fn test_mock_client_receives_stage_messages() {
    let mut mock = MockGenerationClient::new();
    mock.expect_complete_streaming()
        .withf(|messages, max_output_tokens| {
            *max_output_tokens == 2000
                && messages.len() == 2
                && messages[0].role == ChatRole::System
                && messages[0].content == "Summarize."
                && messages[1].role == ChatRole::User
                && messages[1].content.ends_with("quarterly report")
        })
        .times(1)
        .returning(|_, _| {
            let fragments: Vec<Result<String, GenerationError>> =
                vec![Ok("Rev".to_string()), Ok("enue up".to_string())];
            Ok(stream::iter(fragments).boxed())
        });

    let pipeline =
        PipelineDefinition::new().with_stage(StageDefinition::new("Summarizer", 1, "Summarize."));
    let orchestrator = Orchestrator::new(pipeline, Arc::new(mock));

    let result = orchestrator
        .run("quarterly report", &CancellationToken::new())
        .await;

    assert_run_succeeded(&result, "Revenue up");
}

#[tokio::test]
async fn test_mock_client_error_is_recorded_verbatim() {
    let mut mock = MockGenerationClient::new();
    mock.expect_complete()
        .times(1)
        .returning(|_, _| Err(GenerationError::provider("model overloaded")));

    let config = OrchestratorConfig::new().with_streaming(false);
    let orchestrator = Orchestrator::with_config(pipeline_of(ABC), Arc::new(mock), config).unwrap();

    let result = orchestrator.run("X", &CancellationToken::new()).await;
    assert_run_failed(&result, "model overloaded");
}

// ============================================================================
// Streaming runs
// ============================================================================

#[tokio::test]
async fn test_streaming_yields_steps_in_order() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));

    let steps: Vec<StepResult> = harness
        .orchestrator
        .run_streaming("X", &CancellationToken::new())
        .collect()
        .await;

    assert_stage_order(&steps, ABC);
    assert!(steps.iter().all(StepResult::is_completed));
    assert_eq!(steps[2].output(), Some("X!!!"));
}

#[tokio::test]
async fn test_streaming_is_lazy() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let (states, _subscription) = record_states(&harness.orchestrator);

    let stream = harness
        .orchestrator
        .run_streaming("X", &CancellationToken::new());
    assert_eq!(harness.client.call_count(), 0);
    drop(stream);

    assert_eq!(harness.client.call_count(), 0);
    assert!(states.lock().is_empty());
    assert_eq!(harness.orchestrator.current_state().run_id, None);
}

#[tokio::test]
async fn test_completion_snapshot_precedes_next_stage() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let mut stream = harness
        .orchestrator
        .run_streaming("X", &CancellationToken::new());

    let first = stream.next().await.unwrap();
    assert_step_completed(&first, "X!");

    let state = harness.orchestrator.current_state();
    assert!(state.is_running);
    assert_eq!(state.current_step_index, Some(0));
    assert_eq!(state.completed_steps, vec![first]);
    assert!(state.current_step.is_none());
    assert_eq!(harness.client.call_count(), 1);
}

#[tokio::test]
async fn test_dropping_stream_mid_run_cancels() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let mut stream = harness
        .orchestrator
        .run_streaming("X", &CancellationToken::new());

    stream.next().await.unwrap();
    drop(stream);

    let state = harness.orchestrator.current_state();
    assert!(!state.is_running);
    assert_eq!(state.completed_steps.len(), 2);
    assert_step_cancelled(&state.completed_steps[1]);
    assert_eq!(state.completed_steps[1].stage_name(), "B");
    assert_eq!(harness.client.call_count(), 1);
}

#[tokio::test]
async fn test_stream_ends_after_last_step() {
    let harness = TestPipeline::new(&["A"], ScriptedGenerationClient::echo("!"));
    let mut stream = harness
        .orchestrator
        .run_streaming("X", &CancellationToken::new());

    assert!(stream.next().await.is_some());
    assert!(harness.orchestrator.current_state().is_running);
    assert!(stream.next().await.is_none());
    assert!(stream.next().await.is_none());

    let state = harness.orchestrator.current_state();
    assert!(state.is_completed());
    assert_eq!(state.current_step_index, Some(0));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_before_start() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let token = CancellationToken::new();
    token.cancel("not needed");

    let result = harness.orchestrator.run("X", &token).await;

    assert!(!result.success);
    assert!(result.is_cancelled());
    assert_eq!(result.error.as_deref(), Some("Pipeline cancelled"));
    assert_eq!(result.steps.len(), 1);
    assert_step_cancelled(&result.steps[0]);
    assert_eq!(result.steps[0].stage_name(), "A");
    assert_eq!(result.steps[0].duration(), std::time::Duration::ZERO);
    assert_eq!(harness.client.call_count(), 0);

    let state = harness.orchestrator.current_state();
    assert!(!state.is_running);
    assert_eq!(state.current_step_index, Some(0));
}

#[tokio::test]
async fn test_cancel_during_second_stage() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!").hang_on_call(1));
    let orchestrator = &harness.orchestrator;
    let token = CancellationToken::new();

    let (result, ()) = tokio::join!(orchestrator.run("X", &token), async {
        harness.client.wait_for_calls(2).await;
        orchestrator.cancel();
    });

    assert_stage_order(&result.steps, &["A", "B"]);
    assert_step_completed(&result.steps[0], "X!");
    assert_step_cancelled(&result.steps[1]);
    assert!(result.is_cancelled());
    assert!(!result.success);

    let state = orchestrator.current_state();
    assert!(!state.is_running);
    assert_eq!(state.current_step_index, Some(1));
    assert_eq!(harness.client.call_count(), 2);
}

#[tokio::test]
async fn test_caller_token_cancels_in_flight_stage() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!").hang_on_call(0));
    let token = CancellationToken::new();

    let (result, ()) = tokio::join!(harness.orchestrator.run("X", &token), async {
        harness.client.wait_for_calls(1).await;
        token.cancel("caller gave up");
    });

    assert_eq!(result.steps.len(), 1);
    assert_step_cancelled(&result.steps[0]);
}

#[tokio::test]
async fn test_cancel_wakes_pending_stream() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!").hang_on_call(0));
    let mut stream = harness
        .orchestrator
        .run_streaming("X", &CancellationToken::new());

    let mut next = tokio_test::task::spawn(stream.next());
    tokio_test::assert_pending!(next.poll());
    assert!(harness.orchestrator.current_state().is_running);

    harness.orchestrator.cancel();
    assert!(next.is_woken());
    let step = tokio_test::assert_ready!(next.poll()).unwrap();
    assert_step_cancelled(&step);
}

#[tokio::test]
async fn test_cancel_without_active_run_is_noop() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    harness.orchestrator.cancel();

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;
    assert_run_succeeded(&result, "X!!!");

    // The finished run no longer holds a token.
    harness.orchestrator.cancel();
    assert!(harness.orchestrator.current_state().is_completed());
}

// ============================================================================
// Snapshots and observers
// ============================================================================

#[test]
fn test_initial_state() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let state = harness.orchestrator.current_state();

    assert_eq!(*state, PipelineState::initial(3));
    assert!(!state.is_running);
    assert_eq!(state.progress_percentage(), 0);
}

#[tokio::test]
async fn test_snapshot_sequence() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let (states, _subscription) = record_states(&harness.orchestrator);

    harness.orchestrator.run("X", &CancellationToken::new()).await;

    let states = states.lock();
    // running + completed per stage, then the terminal snapshot
    assert_eq!(states.len(), 7);
    for state in states.iter() {
        assert_snapshot_consistent(state);
    }

    let first = &states[0];
    assert!(first.is_running);
    assert_eq!(first.current_step_index, Some(0));
    assert_eq!(
        first.current_step.as_ref().map(StepResult::status),
        Some(StepStatus::Running)
    );
    assert!(first.completed_steps.is_empty());

    let progress: Vec<usize> = states.iter().map(PipelineState::progress_percentage).collect();
    assert_eq!(progress, vec![0, 33, 33, 66, 66, 100, 100]);

    let last = states.last().unwrap();
    assert!(last.is_completed());
    assert_eq!(last.current_step_index, Some(2));
    assert!(last.current_step.is_none());
}

#[tokio::test]
async fn test_snapshots_on_failure() {
    let client = ScriptedGenerationClient::echo("!")
        .fail_on_call(1, GenerationError::QuotaExceeded("quota exceeded".into()));
    let harness = TestPipeline::new(ABC, client);
    let (states, _subscription) = record_states(&harness.orchestrator);

    harness.orchestrator.run("X", &CancellationToken::new()).await;

    let states = states.lock();
    for state in states.iter() {
        assert_snapshot_consistent(state);
    }
    let last = states.last().unwrap();
    assert!(!last.is_running);
    assert!(last.has_failed());
    assert_eq!(last.completed_steps.len(), 2);
    assert_eq!(last.progress_percentage(), 66);
}

#[tokio::test]
async fn test_panicking_observer_does_not_break_run() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = counter.clone();

    let _bad = harness
        .orchestrator
        .subscribe(|_state| panic!("observer failure"));
    let _good = harness.orchestrator.subscribe(move |_state| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_run_succeeded(&result, "X!!!");
    assert_eq!(counter.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn test_dropped_subscription_stops_notifications() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = counter.clone();

    let subscription = harness.orchestrator.subscribe(move |_state| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    drop(subscription);

    harness.orchestrator.run("X", &CancellationToken::new()).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_observer_sees_published_snapshot() {
    let harness = Arc::new(TestPipeline::new(ABC, ScriptedGenerationClient::echo("!")));
    let mismatches = Arc::new(AtomicUsize::new(0));

    let observed = Arc::downgrade(&harness);
    let counter = mismatches.clone();
    let _subscription = harness.orchestrator.subscribe(move |state| {
        if let Some(harness) = observed.upgrade() {
            if *harness.orchestrator.current_state() != *state {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    harness.orchestrator.run("X", &CancellationToken::new()).await;
    assert_eq!(mismatches.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Progress relay
// ============================================================================

#[tokio::test]
async fn test_progress_relay_forwards_run() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let sink = Arc::new(CollectingEventSink::new());
    let relay = ProgressRelay::attach(&harness.orchestrator, sink.clone());

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_eq!(sink.events_named(STATE_CHANGED).len(), 7);
    let steps = sink.events_named(STEP_COMPLETED);
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[2].1.as_ref().unwrap()["output"], serde_json::json!("X!!!"));

    let finished = sink.events_named(PIPELINE_COMPLETED);
    assert_eq!(finished.len(), 1);
    let payload = finished[0].1.clone().unwrap();
    assert_eq!(payload["success"], serde_json::json!(true));
    assert_eq!(payload["final_output"], serde_json::json!("X!!!"));
    assert_eq!(payload["run_id"], serde_json::json!(result.run_id));

    drop(relay);
    sink.clear();
    harness.orchestrator.run("X", &CancellationToken::new()).await;
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_progress_relay_reports_failure() {
    let client = ScriptedGenerationClient::echo("!")
        .fail_on_call(1, GenerationError::QuotaExceeded("quota exceeded".into()));
    let harness = TestPipeline::new(ABC, client);
    let sink = Arc::new(CollectingEventSink::new());
    let _relay = ProgressRelay::attach(&harness.orchestrator, sink.clone());

    harness.orchestrator.run("X", &CancellationToken::new()).await;

    assert_eq!(sink.events_named(STEP_COMPLETED).len(), 1);
    let finished = sink.events_named(PIPELINE_COMPLETED);
    assert_eq!(finished.len(), 1);
    let payload = finished[0].1.clone().unwrap();
    assert_eq!(payload["success"], serde_json::json!(false));
    assert_eq!(payload["error"], serde_json::json!("quota exceeded"));
}

#[tokio::test]
async fn test_progress_relay_with_logging_sink() {
    let harness = TestPipeline::new(ABC, ScriptedGenerationClient::echo("!"));
    let relay = ProgressRelay::attach(&harness.orchestrator, Arc::new(LoggingEventSink::debug()));

    let result = harness.orchestrator.run("X", &CancellationToken::new()).await;
    drop(relay);

    assert_run_succeeded(&result, "X!!!");
    assert!(harness.orchestrator.current_state().is_completed());
}
