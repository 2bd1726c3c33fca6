//! Stage definitions.

use serde::{Deserialize, Serialize};

/// Immutable description of one pipeline step.
///
/// Every stage behaves the same way at run time (send instructions plus
/// context, receive text), so a stage is plain data: only its name, position
/// and instruction text differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    name: String,
    #[serde(default)]
    description: String,
    order: i32,
    instructions: String,
}

impl StageDefinition {
    /// Creates a new stage definition.
    #[must_use]
    pub fn new(name: impl Into<String>, order: i32, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            order,
            instructions: instructions.into(),
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the ordinal position used for sorting.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Returns the instruction text sent as the system message.
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Compares `name` against this stage's name, ignoring case.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.name.to_lowercase() == name.to_lowercase()
    }
}
