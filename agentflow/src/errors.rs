//! Error types for the agentflow crate.
//!
//! Stage-level failures never surface through these types: they are captured
//! into [`StepResult`](crate::core::StepResult) and
//! [`PipelineResult`](crate::core::PipelineResult). What remains here are
//! precondition violations and configuration problems that the immediate
//! caller must handle.

use thiserror::Error;

/// The main error type for agentflow operations.
#[derive(Debug, Error)]
pub enum AgentflowError {
    /// A stage was looked up by a position outside the pipeline.
    #[error("Stage index {index} is out of range for a pipeline of {len} stages")]
    StageIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of stages in the pipeline.
        len: usize,
    },

    /// The orchestrator configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentflowError {
    /// Creates an out-of-range error.
    #[must_use]
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::StageIndexOutOfRange { index, len }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<serde_json::Error> for AgentflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
