//! Completion Relay: turns a conversation into a request for an external
//! text-completion provider and hands back plain text.

pub mod openai;
pub mod persona;

pub use openai::OpenAiClient;
pub use persona::KRISHNA_SYSTEM_PROMPT;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::Exchange;

/// Stored in place of an empty completion when the fallback is enabled.
pub const PLACEHOLDER_RESPONSE: &str = "Response from Krishna";

/// Number of prior exchanges replayed to the provider.
pub const HISTORY_EXCHANGES: i64 = 3;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("No messages provided")]
    NoMessages,

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Provider returned an empty response")]
    Empty,
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Network(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// JSON schema for a structured reply; the provider returns its arguments verbatim.
    pub schema: Option<serde_json::Value>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, schema: None }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// Persona prompt, then `history` replayed oldest-first, then the new message.
///
/// `history` is expected newest-first, as `get_chat_exchanges` returns it.
pub fn build_conversation(persona: &str, history: &[Exchange], message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(persona));

    for exchange in history.iter().rev() {
        messages.push(ChatMessage::user(exchange.user_message.as_str()));
        messages.push(ChatMessage::assistant(exchange.ai_response.as_str()));
    }

    messages.push(ChatMessage::user(message));
    messages
}

/// Schema used when a caller asks for a structured reply.
pub fn structured_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "tone": { "type": "string" },
            "wisdomLevel": { "type": "string" },
        },
        "required": ["message"],
    })
}

/// Run a completion, masking an empty reply with [`PLACEHOLDER_RESPONSE`]
/// when `fallback_on_empty` is set.
///
/// Transport and provider failures are never masked.
pub async fn complete_or_placeholder(
    client: &dyn CompletionClient,
    request: CompletionRequest,
    fallback_on_empty: bool,
) -> Result<String, CompletionError> {
    match client.complete(request).await {
        Err(CompletionError::Empty) if fallback_on_empty => {
            tracing::warn!("Completion provider returned no text; storing placeholder reply");
            Ok(PLACEHOLDER_RESPONSE.to_string())
        }
        other => other,
    }
}
