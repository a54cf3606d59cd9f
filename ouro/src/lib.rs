//! Ouro - self-improvement loop for conversational AI services
//!
//! Ouro repeatedly prompts a model to improve its own code and prompts. Each
//! iteration pulls the fenced code block and the `Updated Prompts:` line out of
//! the reply, saves the code to a file, asks the model to evaluate the change,
//! and feeds everything back as the next prompt. The loop ends once an
//! evaluation says the improvement is significant.
//!
//! # Modules
//!
//! - [`llm`] - LLM client trait and Gemini/Anthropic/OpenAI implementations
//! - [`chat`] - Conversation session on top of a client
//! - [`extract`] - Code block and prompts extraction
//! - [`stop`] - Keyword stop condition
//! - [`prompts`] - Prompt templates
//! - [`r#loop`] - Loop execution engine
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod chat;
pub mod cli;
pub mod config;
pub mod extract;
pub mod llm;
pub mod prompts;
pub mod stop;

// Note: 'loop' is a reserved keyword, so we use r#loop
#[path = "loop/mod.rs"]
pub mod r#loop;

// Re-export commonly used types
pub use chat::ChatSession;
pub use config::{ChatConfig, Config, ImproveConfig, LlmConfig, ResolvedLlmConfig};
pub use extract::{contains_code_block, extract_code_block, extract_prompts};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, GeminiClient, LlmClient, LlmError, Message, OpenAIClient,
    Role, StopReason, TokenUsage, create_client,
};
pub use r#loop::{ArtifactWriter, IterationReport, LoopEngine, LoopStatus, RunOutcome};
pub use prompts::{PromptLoader, PromptOrigin};
pub use stop::{STOP_KEYWORDS, StopCondition, is_significant};
