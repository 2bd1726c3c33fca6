//! User-message composition for stage calls.
//!
//! The first stage only sees the original input. Later stages see both the
//! original input and the previous stage's output, so context is never lost
//! across hops.

use crate::generation::ChatMessage;
use super::StageDefinition;

const INITIAL_PREFIX: &str = "Please analyze the following:\n\n";
const ORIGINAL_HEADER: &str = "Original Request:\n";
const PREVIOUS_HEADER: &str = "\n\nPrevious Stage Output:\n";
const DIRECTIVE: &str = "\n\nPlease process this according to your role.";

/// The user-facing payload of a stage call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePrompt {
    /// The first stage of a run.
    Initial {
        /// The raw run input.
        original: String,
    },
    /// Any stage after the first.
    Chained {
        /// The raw run input.
        original: String,
        /// Output of the immediately preceding stage.
        previous: String,
    },
}

impl StagePrompt {
    /// Builds the prompt for the stage at `index`.
    #[must_use]
    pub fn for_step(index: usize, original: &str, previous: &str) -> Self {
        if index == 0 {
            Self::Initial {
                original: original.to_string(),
            }
        } else {
            Self::Chained {
                original: original.to_string(),
                previous: previous.to_string(),
            }
        }
    }

    /// Renders the user message text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Initial { original } => format!("{INITIAL_PREFIX}{original}"),
            Self::Chained { original, previous } => {
                format!("{ORIGINAL_HEADER}{original}{PREVIOUS_HEADER}{previous}{DIRECTIVE}")
            }
        }
    }

    /// Recovers a prompt from rendered text.
    ///
    /// Inverse of [`render`](Self::render) as long as the original input does
    /// not itself contain the previous-output header.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(original) = text.strip_prefix(INITIAL_PREFIX) {
            return Some(Self::Initial {
                original: original.to_string(),
            });
        }

        let body = text.strip_prefix(ORIGINAL_HEADER)?.strip_suffix(DIRECTIVE)?;
        let (original, previous) = body.split_once(PREVIOUS_HEADER)?;
        Some(Self::Chained {
            original: original.to_string(),
            previous: previous.to_string(),
        })
    }

    /// Returns the text the stage is asked to work on: the previous output
    /// for chained prompts, the original input otherwise.
    #[must_use]
    pub fn current_input(&self) -> &str {
        match self {
            Self::Initial { original } => original,
            Self::Chained { previous, .. } => previous,
        }
    }

    /// Builds the full message list for a stage call.
    #[must_use]
    pub fn messages(&self, stage: &StageDefinition) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(stage.instructions()),
            ChatMessage::user(self.render()),
        ]
    }
}
