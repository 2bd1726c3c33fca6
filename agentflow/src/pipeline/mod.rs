//! Pipeline definitions.
//!
//! This module provides:
//! - Stage definitions (name, order, instructions)
//! - Ordered pipeline definitions with lookup by position and name
//! - User-message composition for stage calls

mod definition;
mod prompt;
mod stage;

pub use definition::PipelineDefinition;
pub use prompt::StagePrompt;
pub use stage::StageDefinition;
