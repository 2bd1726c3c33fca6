//! Observability utilities.

mod spans;

pub use spans::{init_tracing, run_span, stage_span, SpanTimer};
