//! Ordered pipeline definitions.

use super::StageDefinition;
use crate::errors::AgentflowError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An ordered sequence of stages, always sorted by ordinal position.
///
/// Sorting is stable: stages sharing an ordinal keep their insertion order.
/// Names should be unique; lookups by name return the first match.
/// Once handed to an [`Orchestrator`](crate::orchestrator::Orchestrator) the
/// definition is shared read-only for the life of that orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<StageDefinition>", into = "Vec<StageDefinition>")]
pub struct PipelineDefinition {
    stages: Vec<StageDefinition>,
}

impl PipelineDefinition {
    /// Creates an empty pipeline definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage and re-sorts by ordinal.
    pub fn add_stage(&mut self, stage: StageDefinition) -> &mut Self {
        self.stages.push(stage);
        self.stages.sort_by_key(StageDefinition::order);
        self
    }

    /// Adds a stage, builder style.
    #[must_use]
    pub fn with_stage(mut self, stage: StageDefinition) -> Self {
        self.add_stage(stage);
        self
    }

    /// Removes all stages.
    pub fn clear(&mut self) {
        self.stages.clear();
    }

    /// Returns the stage at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentflowError::StageIndexOutOfRange`] if `index` is not in
    /// `[0, len)`.
    pub fn stage_at(&self, index: usize) -> Result<&StageDefinition, AgentflowError> {
        self.stages
            .get(index)
            .ok_or_else(|| AgentflowError::out_of_range(index, self.stages.len()))
    }

    /// Returns the position of the first stage named `name`, ignoring case.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.is_named(name))
    }

    /// Returns the first stage named `name`, ignoring case.
    #[must_use]
    pub fn stage_named(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.is_named(name))
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Iterates over the stages in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, StageDefinition> {
        self.stages.iter()
    }

    /// Parses a JSON array of stage definitions.
    pub fn from_json_str(json: &str) -> Result<Self, AgentflowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON array of stage definitions from a file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AgentflowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

impl FromIterator<StageDefinition> for PipelineDefinition {
    fn from_iter<I: IntoIterator<Item = StageDefinition>>(iter: I) -> Self {
        let mut pipeline = Self::new();
        for stage in iter {
            pipeline.add_stage(stage);
        }
        pipeline
    }
}

impl From<Vec<StageDefinition>> for PipelineDefinition {
    fn from(stages: Vec<StageDefinition>) -> Self {
        stages.into_iter().collect()
    }
}

impl From<PipelineDefinition> for Vec<StageDefinition> {
    fn from(pipeline: PipelineDefinition) -> Self {
        pipeline.stages
    }
}

impl<'a> IntoIterator for &'a PipelineDefinition {
    type Item = &'a StageDefinition;
    type IntoIter = std::slice::Iter<'a, StageDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}
