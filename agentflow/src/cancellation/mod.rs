//! Cooperative cancellation.
//!
//! This module provides `CancellationToken`, shared between a caller and a
//! running pipeline. Tokens can be linked so that cancelling a caller's token
//! also cancels the run-scoped token derived from it.

mod token;

pub use token::{CancelCallback, CancellationToken};
