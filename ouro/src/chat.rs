//! Chat session
//!
//! Turns the stateless [`LlmClient`] into a prompt-in, text-out conversation.
//! With history enabled every request replays the earlier turns, so the model
//! sees the loop as one ongoing chat.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, TokenUsage};

/// A conversation with one model
pub struct ChatSession {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    max_tokens: u32,
    keep_history: bool,
    max_history_messages: usize,
    history: Vec<Message>,
    usage: TokenUsage,
    round_trips: u32,
}

impl ChatSession {
    /// Create a session that keeps full history
    pub fn new(llm: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        debug!(model = %llm.model(), max_tokens, "ChatSession::new: called");
        Self {
            llm,
            system_prompt: String::new(),
            max_tokens,
            keep_history: true,
            max_history_messages: 0,
            history: Vec::new(),
            usage: TokenUsage::default(),
            round_trips: 0,
        }
    }

    /// Create a session configured from the `chat` config section
    pub fn from_config(llm: Arc<dyn LlmClient>, max_tokens: u32, config: &ChatConfig) -> Self {
        debug!(?config, "ChatSession::from_config: called");
        let mut session = Self::new(llm, max_tokens);
        session.keep_history = config.history;
        session.max_history_messages = config.max_history_messages;
        session
    }

    /// Set the system instruction sent with every request
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Send `prompt` and return the model's text reply
    ///
    /// On failure the prompt is not recorded, so history keeps alternating
    /// user and assistant turns.
    pub async fn send(&mut self, prompt: &str) -> Result<String, LlmError> {
        debug!(prompt_len = prompt.len(), history_len = self.history.len(), "ChatSession::send: called");

        let messages = if self.keep_history {
            self.trim_history();
            let mut messages = self.history.clone();
            messages.push(Message::user(prompt));
            messages
        } else {
            vec![Message::user(prompt)]
        };

        let request = CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            messages,
            max_tokens: self.max_tokens,
        };

        let response = self.llm.complete(request).await?;
        self.round_trips += 1;
        self.usage.add(&response.usage);

        let Some(text) = response.content else {
            debug!(stop_reason = ?response.stop_reason, "ChatSession::send: no text content");
            return Err(LlmError::EmptyResponse);
        };

        info!(
            round_trips = self.round_trips,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Received response ({} chars)",
            text.len()
        );

        if self.keep_history {
            self.history.push(Message::user(prompt));
            self.history.push(Message::assistant(text.clone()));
        }

        Ok(text)
    }

    /// Drop the oldest user/assistant pairs until one more pair fits the limit
    fn trim_history(&mut self) {
        if self.max_history_messages == 0 {
            return;
        }
        let budget = self.max_history_messages.saturating_sub(1);
        let mut excess = self.history.len().saturating_sub(budget);
        // keep pairs intact
        excess += excess % 2;
        let excess = excess.min(self.history.len());
        if excess > 0 {
            debug!(excess, "ChatSession::trim_history: dropping oldest messages");
            self.history.drain(..excess);
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Cumulative token usage across all round trips
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Number of completed requests
    pub fn round_trips(&self) -> u32 {
        self.round_trips
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }
}
