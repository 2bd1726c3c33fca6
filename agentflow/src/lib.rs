//! # Agentflow
//!
//! Sequential multi-stage agent pipelines driven by a text-generation client.
//!
//! A pipeline is an ordered list of stages, each carrying the instructions
//! for one "agent". The orchestrator feeds the run input to the first stage,
//! passes every stage's output (together with the original input) to the
//! next, and reports progress with:
//!
//! - **Step results**: one value per stage transition, streamed as they happen
//! - **Snapshots**: an immutable [`PipelineState`](core::PipelineState) replaced on every transition
//! - **Observers**: synchronous callbacks with RAII unsubscription
//! - **Cancellation**: cooperative, checked at stage entry and raced against generation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentflow::prelude::*;
//! use std::sync::Arc;
//!
//! let pipeline = PipelineDefinition::new()
//!     .with_stage(StageDefinition::new("Analyst", 1, "You analyze requests."))
//!     .with_stage(StageDefinition::new("Writer", 2, "You write drafts."))
//!     .with_stage(StageDefinition::new("Editor", 3, "You polish drafts."));
//!
//! let orchestrator = Orchestrator::new(pipeline, client);
//! let _relay = ProgressRelay::attach(&orchestrator, Arc::new(LoggingEventSink::info()));
//! let result = orchestrator.run("a product launch", &CancellationToken::new()).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod generation;
pub mod observability;
pub mod orchestrator;
pub mod pipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{LoggingConfig, OrchestratorConfig};
    pub use crate::core::{PipelineResult, PipelineState, StepResult, StepStatus};
    pub use crate::errors::AgentflowError;
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, ProgressRelay};
    pub use crate::generation::{
        ChatMessage, ChatRole, FragmentStream, GenerationClient, GenerationError,
    };
    pub use crate::observability::init_tracing;
    pub use crate::orchestrator::{Orchestrator, Subscription};
    pub use crate::pipeline::{PipelineDefinition, StageDefinition, StagePrompt};
}
