//! Conversation Persistence
//!
//! Conversations live in memory for the running session. Every mutation
//! queues a snapshot for a background writer that mirrors it to a durable
//! [`KeyValueStore`]:
//!
//! | Key                   | Value                                      |
//! |-----------------------|--------------------------------------------|
//! | `conversations`       | JSON array of [`Conversation`], newest first |
//! | `active-conversation` | id of the conversation on screen, or absent |
//!
//! The in-memory copy is authoritative. Callers never wait on disk; a failed
//! write is logged by the writer and reported by the next
//! [`ConversationStore::flush`], and a corrupt or unreadable durable value
//! loads as empty rather than failing startup.
//!
//! [`Conversation`]: crate::conversation::Conversation

mod conversations;
mod kv;
mod writer;

pub use conversations::ConversationStore;
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};

use thiserror::Error;

/// Key holding the conversation collection
pub const CONVERSATIONS_KEY: &str = "conversations";

/// Key holding the active conversation id
pub const ACTIVE_CONVERSATION_KEY: &str = "active-conversation";

/// Maximum number of stored conversations
pub const MAX_CONVERSATIONS: usize = 20;

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Durable storage could not be read or written
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be serialized
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key is not usable by the backend
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The background writer is no longer running
    #[error("store writer has stopped")]
    WriterClosed,
}
