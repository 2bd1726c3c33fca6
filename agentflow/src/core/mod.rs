//! Core domain model types for agentflow.
//!
//! This module contains the value types produced by a pipeline run:
//! - Step status enum
//! - Per-stage step results
//! - Pipeline state snapshots and the terminal pipeline result

mod result;
mod state;
mod status;
mod step;

pub use result::PipelineResult;
pub use state::PipelineState;
pub use status::StepStatus;
pub use step::{estimate_step_tokens, estimate_tokens, StepResult, CHARS_PER_TOKEN};

/// Serializes a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
