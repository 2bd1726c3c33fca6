//! Orchestrator configuration.

use crate::errors::AgentflowError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for an [`Orchestrator`](crate::orchestrator::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum tokens each stage may generate.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Whether stages use the incremental generation call.
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    /// Upper bound on bytes accumulated from a streamed response.
    #[serde(default = "default_max_buffered_output_bytes")]
    pub max_buffered_output_bytes: usize,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_output_tokens() -> u32 {
    2000
}

fn default_streaming() -> bool {
    true
}

fn default_max_buffered_output_bytes() -> usize {
    1024 * 1024 // 1MB
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: default_max_output_tokens(),
            streaming: default_streaming(),
            max_buffered_output_bytes: default_max_buffered_output_bytes(),
            logging: LoggingConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-stage output token bound.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Enables or disables streaming generation.
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Sets the streamed output buffer limit.
    #[must_use]
    pub fn with_max_buffered_output_bytes(mut self, bytes: usize) -> Self {
        self.max_buffered_output_bytes = bytes;
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentflowError::Config`] if a bound is zero.
    pub fn validate(&self) -> Result<(), AgentflowError> {
        if self.max_output_tokens == 0 {
            return Err(AgentflowError::config("max_output_tokens must be greater than 0"));
        }
        if self.max_buffered_output_bytes == 0 {
            return Err(AgentflowError::config(
                "max_buffered_output_bytes must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, AgentflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AgentflowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}
