//! Bounded accumulation of streamed fragments.

use super::{FragmentStream, GenerationError};
use futures::StreamExt;

/// Concatenates generated fragments up to a byte limit.
#[derive(Debug)]
pub struct OutputBuffer {
    text: String,
    limit: usize,
}

impl OutputBuffer {
    /// Creates an empty buffer holding at most `limit` bytes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
        }
    }

    /// Appends a fragment.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::OutputTooLarge`] if the fragment would push
    /// the buffer past its limit. The buffer is left unchanged.
    pub fn push(&mut self, fragment: &str) -> Result<(), GenerationError> {
        if self.text.len() + fragment.len() > self.limit {
            return Err(GenerationError::OutputTooLarge { limit: self.limit });
        }
        self.text.push_str(fragment);
        Ok(())
    }

    /// Drains a fragment stream into the buffer.
    pub async fn fill(&mut self, mut fragments: FragmentStream) -> Result<(), GenerationError> {
        while let Some(fragment) = fragments.next().await {
            self.push(&fragment?)?;
        }
        Ok(())
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true if nothing has been buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Consumes the buffer and returns the text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}
