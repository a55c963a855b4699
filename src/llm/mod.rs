//! Chat model providers used by the reasoning agent.

use serde::Serialize;

use crate::error::Result;

mod anthropic;
mod ollama;
mod openai;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Trait implemented by concrete LLM providers.
pub trait LlmProvider: Send + Sync {
    /// Returns the assistant's reply to the conversation in `request`.
    fn answer(&self, request: &ProviderRequest<'_>) -> Result<String>;
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side (and tool observations).
    User,
    /// The model side.
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

impl ChatMessage {
    /// User turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request envelope shared by the various providers.
pub struct ProviderRequest<'a> {
    /// System instructions.
    pub system: &'a str,
    /// Conversation so far, oldest first.
    pub messages: &'a [ChatMessage],
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}
