//! Testing utilities for agentflow pipelines.
//!
//! This module provides:
//! - A scripted generation client
//! - Assertions for steps, snapshots and results
//! - Pipeline fixtures and a test harness

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_run_failed, assert_run_succeeded, assert_snapshot_consistent, assert_stage_order,
    assert_step_cancelled, assert_step_completed, assert_step_failed,
};
pub use fixtures::{instructions_for, pipeline_of, TestPipeline};
pub use mocks::{RecordedCall, ScriptedGenerationClient};
