//! Tracing setup and span helpers for pipeline runs.
//!
//! The orchestrator logs through the `tracing` macros; installing a
//! subscriber is left to the hosting process, which can call
//! [`init_tracing`] with its [`LoggingConfig`].

use crate::config::LoggingConfig;
use std::time::{Duration, Instant};
use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Installs a global `tracing-subscriber` fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Returns `false`
/// if a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.is_ok()
}

/// Creates the span that wraps a whole pipeline run.
#[must_use]
pub fn run_span(run_id: Uuid, total_steps: usize) -> Span {
    tracing::info_span!("pipeline.run", run_id = %run_id, total_steps)
}

/// Creates the span that wraps a single stage.
#[must_use]
pub fn stage_span(stage: &str, step: usize) -> Span {
    tracing::info_span!("pipeline.stage", stage, step)
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> Duration {
        self.elapsed()
    }
}
