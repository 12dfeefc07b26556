//! LLM collaborator contract
//!
//! The crate never talks to a provider directly. Callers inject an
//! [`LlmProvider`] and the LLM-backed intent classifier drives it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by an LLM provider
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider rejected the request due to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Call did not finish in time
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Response could not be used
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other provider failure
    #[error("Provider error: {0}")]
    Provider(String),
}

impl LlmError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Transport(_) | LlmError::Timeout(_) | LlmError::RateLimitExceeded(_)
        )
    }
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Token usage and cost of one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
}

/// Provider reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Usage,
}

/// Chat capability injected into the LLM classifier
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send messages and wait for the reply
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> std::result::Result<ChatResponse, LlmError>;

    /// Provider name, used for usage reports
    fn name(&self) -> &str {
        "unknown"
    }

    /// Model identifier, used for usage reports
    fn model(&self) -> &str {
        "unknown"
    }
}
