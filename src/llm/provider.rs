//! Model backend trait and message types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A model backend capable of chat and one-shot generation.
///
/// Implementations must be cheap to call concurrently; any retry or
/// credential handling is internal to the backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Identifier used in logs and error attributions.
    fn name(&self) -> &str;

    /// Multi-turn chat completion over the given history.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// One-shot generation from a bare prompt.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }
}
