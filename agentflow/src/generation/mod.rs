//! Text-generation client interface.
//!
//! The orchestrator talks to the hosted model only through
//! [`GenerationClient`]. Concrete HTTP providers live outside this crate and
//! implement the trait; tests use the scripted client in
//! [`crate::testing`].

mod buffer;

pub use buffer::OutputBuffer;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A stream of generated text fragments.
pub type FragmentStream = BoxStream<'static, Result<String, GenerationError>>;

/// Role of a message sent to the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Stage instructions.
    System,
    /// Stage input.
    User,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
        }
    }
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }
}

/// Errors raised by a generation provider.
///
/// `QuotaExceeded` and `Provider` display their message verbatim so that the
/// provider's own wording ends up in the failed step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The provider could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The provider refused the call because of a usage limit.
    #[error("{0}")]
    QuotaExceeded(String),

    /// The provider returned something that could not be interpreted.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A streamed response grew past the configured buffer limit.
    #[error("Generated output exceeded {limit} bytes")]
    OutputTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// Any other provider failure.
    #[error("{0}")]
    Provider(String),
}

impl GenerationError {
    /// Creates a generic provider error.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }
}

/// Adapter over an external text-generation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generates a full response for `messages`.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_output_tokens: u32,
    ) -> Result<String, GenerationError>;

    /// Generates a response incrementally. The caller concatenates the
    /// fragments to obtain the full output.
    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        max_output_tokens: u32,
    ) -> Result<FragmentStream, GenerationError>;
}
