//! Scripted generation client for testing.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Notify;

use crate::generation::{ChatMessage, ChatRole, FragmentStream, GenerationClient, GenerationError};
use crate::pipeline::StagePrompt;

/// A single call received by a [`ScriptedGenerationClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Messages passed to the client.
    pub messages: Vec<ChatMessage>,
    /// Output bound passed to the client.
    pub max_output_tokens: u32,
    /// Whether the incremental call was used.
    pub streaming: bool,
}

impl RecordedCall {
    /// Returns the system message text.
    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.content_of(ChatRole::System)
    }

    /// Returns the user message text.
    #[must_use]
    pub fn user_message(&self) -> Option<&str> {
        self.content_of(ChatRole::User)
    }

    fn content_of(&self, role: ChatRole) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
    }
}

/// A generation client that echoes its input with a suffix.
///
/// Each call answers with the text the stage was asked to work on followed
/// by the configured suffix, so a three-stage run over `"X"` with suffix
/// `"!"` produces `"X!"`, `"X!!"` and `"X!!!"`. Failures, delays and hangs
/// are scripted by call index (zero-based, in call order) or by the stage
/// instructions carried in the system message.
#[derive(Debug)]
pub struct ScriptedGenerationClient {
    suffix: String,
    delay: Option<Duration>,
    fragment_chars: usize,
    failures_by_call: HashMap<usize, GenerationError>,
    failures_by_instructions: Vec<(String, GenerationError)>,
    hang_on_call: Option<usize>,
    calls: Mutex<Vec<RecordedCall>>,
    call_started: Notify,
}

impl Default for ScriptedGenerationClient {
    fn default() -> Self {
        Self::echo("")
    }
}

impl ScriptedGenerationClient {
    /// Creates a client that appends `suffix` to every input.
    #[must_use]
    pub fn echo(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            delay: None,
            fragment_chars: 8,
            failures_by_call: HashMap::new(),
            failures_by_instructions: Vec::new(),
            hang_on_call: None,
            calls: Mutex::new(Vec::new()),
            call_started: Notify::new(),
        }
    }

    /// Fails the call with the given index.
    #[must_use]
    pub fn fail_on_call(mut self, index: usize, error: GenerationError) -> Self {
        self.failures_by_call.insert(index, error);
        self
    }

    /// Fails every call whose stage instructions equal `instructions`.
    #[must_use]
    pub fn fail_on_instructions(
        mut self,
        instructions: impl Into<String>,
        error: GenerationError,
    ) -> Self {
        self.failures_by_instructions.push((instructions.into(), error));
        self
    }

    /// Never completes the call with the given index.
    #[must_use]
    pub fn hang_on_call(mut self, index: usize) -> Self {
        self.hang_on_call = Some(index);
        self
    }

    /// Sleeps before answering each call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the fragment size, in characters, of streamed responses.
    #[must_use]
    pub fn with_fragment_chars(mut self, chars: usize) -> Self {
        self.fragment_chars = chars.max(1);
        self
    }

    /// Returns every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Waits until at least `count` calls have started.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.call_started.notified();
            if self.call_count() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    async fn respond(
        &self,
        messages: &[ChatMessage],
        max_output_tokens: u32,
        streaming: bool,
    ) -> Result<String, GenerationError> {
        let call = RecordedCall {
            messages: messages.to_vec(),
            max_output_tokens,
            streaming,
        };
        let index = {
            let mut calls = self.calls.lock();
            calls.push(call.clone());
            calls.len() - 1
        };
        self.call_started.notify_waiters();

        if self.hang_on_call == Some(index) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures_by_call.get(&index) {
            return Err(error.clone());
        }
        let instructions = call.instructions().unwrap_or_default();
        if let Some((_, error)) = self
            .failures_by_instructions
            .iter()
            .find(|(expected, _)| expected == instructions)
        {
            return Err(error.clone());
        }

        let user = call.user_message().unwrap_or_default();
        let input = StagePrompt::parse(user)
            .map_or_else(|| user.to_string(), |p| p.current_input().to_string());
        Ok(format!("{input}{}", self.suffix))
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_output_tokens: u32,
    ) -> Result<String, GenerationError> {
        self.respond(messages, max_output_tokens, false).await
    }

    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        max_output_tokens: u32,
    ) -> Result<FragmentStream, GenerationError> {
        let text = self.respond(messages, max_output_tokens, true).await?;
        let chars: Vec<char> = text.chars().collect();
        let fragments: Vec<Result<String, GenerationError>> = chars
            .chunks(self.fragment_chars)
            .map(|chunk| Ok(chunk.iter().collect()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}
