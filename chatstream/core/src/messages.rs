//! Message Types
//!
//! The conversation vocabulary shared by every layer: chat messages, their
//! roles, conversation identifiers, the model selector, and the outbound
//! request body sent to the chat-completion endpoint.
//!
//! # Synthetic Messages
//!
//! Every fresh conversation opens with a fixed greeting. It is a local
//! artifact: it is displayed, persisted with the conversation, but never sent
//! upstream and never counted. The greeting is recognized by an explicit
//! [`Message::synthetic`] flag, so a user typing the same text is still sent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Greeting shown at the top of every fresh conversation
pub const GREETING: &str = "Hello! How can I help you today?";

/// Content placed in the assistant slot when a stream ends without any tokens
pub const EMPTY_RESPONSE_NOTICE: &str = "The server returned an empty response. Please try again.";

/// Model value that lets the server pick its default model
pub const AUTO_MODEL: &str = "auto";

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Model output
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Local-only message (the greeting); excluded from requests and counts
    #[serde(default, skip_serializing_if = "is_false")]
    pub synthetic: bool,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            synthetic: false,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            synthetic: false,
        }
    }

    /// The synthetic greeting that opens every fresh conversation
    #[must_use]
    pub fn greeting() -> Self {
        Self {
            role: MessageRole::Assistant,
            content: GREETING.to_string(),
            synthetic: true,
        }
    }

    /// Check if this message was written by the user
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Unique identifier for a stored conversation
///
/// Opaque to every consumer; only equality matters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Generate a new unique conversation ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which model the server should use
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelSelector {
    /// Let the server choose
    #[default]
    Auto,
    /// An explicit model identifier
    Named(String),
}

impl ModelSelector {
    /// Parse a user-supplied model value; blank or `auto` selects [`ModelSelector::Auto`]
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(AUTO_MODEL) {
            Self::Auto
        } else {
            Self::Named(value.to_string())
        }
    }

    /// The value sent in the request's `model` field
    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Auto => AUTO_MODEL,
            Self::Named(name) => name,
        }
    }
}

impl From<String> for ModelSelector {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ModelSelector> for String {
    fn from(value: ModelSelector) -> Self {
        value.as_wire().to_string()
    }
}

impl std::fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// A message as it appears in the outbound request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Message role
    pub role: MessageRole,
    /// Message content
    pub content: String,
}

/// Body of a streaming chat-completion request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier or the `auto` sentinel
    pub model: String,
    /// Conversation history, oldest first
    pub messages: Vec<WireMessage>,
    /// Always `true`
    pub stream: bool,
}

impl ChatRequest {
    /// Build a streaming request from a message history
    ///
    /// Synthetic messages are dropped; everything else is sent in order.
    #[must_use]
    pub fn from_history(model: &ModelSelector, history: &[Message]) -> Self {
        Self {
            model: model.as_wire().to_string(),
            messages: history
                .iter()
                .filter(|m| !m.synthetic)
                .map(|m| WireMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
        }
    }
}
