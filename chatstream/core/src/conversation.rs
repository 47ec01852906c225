//! Conversation Records
//!
//! A [`Conversation`] is the persisted form of one chat: its full message
//! list plus the derived fields the history list shows without loading
//! messages (`preview` and `message_count`).

use serde::{Deserialize, Serialize};

use crate::messages::{ConversationId, Message};

/// Characters of the first user message kept in a preview
pub const PREVIEW_CHARS: usize = 60;

/// Preview shown before the user has said anything
pub const EMPTY_PREVIEW: &str = "New conversation";

/// A stored conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique identifier
    pub id: ConversationId,
    /// Messages, oldest first (greeting included)
    pub messages: Vec<Message>,
    /// First user message, truncated
    pub preview: String,
    /// Messages excluding the synthetic greeting
    pub message_count: usize,
    /// Creation time (ms since epoch)
    pub created_at: u64,
    /// Last update time (ms since epoch)
    pub updated_at: u64,
}

impl Conversation {
    /// Build a record, deriving `preview` and `message_count`
    #[must_use]
    pub fn from_messages(
        id: ConversationId,
        messages: Vec<Message>,
        created_at: u64,
        updated_at: u64,
    ) -> Self {
        let preview = preview_of(&messages);
        let message_count = messages.iter().filter(|m| !m.synthetic).count();

        Self {
            id,
            messages,
            preview,
            message_count,
            created_at,
            updated_at,
        }
    }
}

/// Derive the preview line for a message list
#[must_use]
pub fn preview_of(messages: &[Message]) -> String {
    let Some(first) = messages.iter().find(|m| m.is_user()) else {
        return EMPTY_PREVIEW.to_string();
    };

    let mut chars = first.content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Get current timestamp in milliseconds
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
