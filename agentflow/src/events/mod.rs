//! Event forwarding for hosting processes.
//!
//! The orchestrator itself only publishes snapshots to observers. A
//! [`ProgressRelay`] turns those snapshots into named events on an
//! [`EventSink`], which a host can bridge to its own transport.

mod relay;
mod sink;

pub use relay::{ProgressRelay, PIPELINE_COMPLETED, STATE_CHANGED, STEP_COMPLETED};
pub use sink::{CollectingEventSink, Event, EventSink, LoggingEventSink, NoOpEventSink};
