//! Test fixtures for pipeline testing.

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::orchestrator::Orchestrator;
use crate::pipeline::{PipelineDefinition, StageDefinition};

use super::ScriptedGenerationClient;

/// Returns the instruction text used for a fixture stage.
#[must_use]
pub fn instructions_for(name: &str) -> String {
    format!("You are the {name} stage.")
}

/// Builds a pipeline with one stage per name, in the given order.
#[must_use]
pub fn pipeline_of(names: &[&str]) -> PipelineDefinition {
    names
        .iter()
        .zip(0_i32..)
        .map(|(name, order)| StageDefinition::new(*name, order, instructions_for(name)))
        .collect()
}

/// An orchestrator wired to a shared scripted client.
#[derive(Debug)]
pub struct TestPipeline {
    /// The orchestrator under test.
    pub orchestrator: Orchestrator,
    /// The client the orchestrator calls.
    pub client: Arc<ScriptedGenerationClient>,
}

impl TestPipeline {
    /// Creates a harness over `names` with the default configuration.
    #[must_use]
    pub fn new(names: &[&str], client: ScriptedGenerationClient) -> Self {
        let client = Arc::new(client);
        let orchestrator = Orchestrator::new(pipeline_of(names), client.clone());
        Self {
            orchestrator,
            client,
        }
    }

    /// Creates a harness with a custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    #[must_use]
    pub fn with_config(
        names: &[&str],
        client: ScriptedGenerationClient,
        config: OrchestratorConfig,
    ) -> Self {
        let client = Arc::new(client);
        let orchestrator = Orchestrator::with_config(pipeline_of(names), client.clone(), config)
            .unwrap_or_else(|e| panic!("invalid test configuration: {e}"));
        Self {
            orchestrator,
            client,
        }
    }
}
