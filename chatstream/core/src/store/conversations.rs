//! Conversation Store
//!
//! Bounded, recency-ordered collection of conversations. Mutations happen in
//! memory under one lock and queue a snapshot for the background writer
//! while still holding it, so the durable copy always moves through the same
//! sequence of states as the in-memory one.

use std::sync::Arc;

use parking_lot::Mutex;

use super::kv::{KeyValueStore, MemoryKeyValueStore};
use super::writer::Writer;
use super::{StoreError, ACTIVE_CONVERSATION_KEY, CONVERSATIONS_KEY, MAX_CONVERSATIONS};
use crate::conversation::Conversation;
use crate::messages::ConversationId;

/// Recency-ordered conversation history with a fixed capacity
pub struct ConversationStore {
    /// Durable mirror, read side
    backend: Arc<dyn KeyValueStore>,
    /// Durable mirror, write side
    writer: Writer,
    /// Authoritative copy, newest first, at most [`MAX_CONVERSATIONS`]
    conversations: Mutex<Vec<Conversation>>,
    /// Authoritative active pointer
    active: Mutex<Option<ConversationId>>,
}

impl ConversationStore {
    /// Open a store over a durable backend, loading what it holds
    ///
    /// Starts the background writer, so it must run inside a Tokio runtime.
    pub async fn open(backend: impl KeyValueStore + 'static) -> Self {
        let backend: Arc<dyn KeyValueStore> = Arc::new(backend);
        let conversations = read_collection(backend.as_ref()).await;
        let active = read_active_id(backend.as_ref()).await;
        tracing::debug!(count = conversations.len(), "Loaded conversations");

        Self {
            writer: Writer::spawn(Arc::clone(&backend)),
            backend,
            conversations: Mutex::new(conversations),
            active: Mutex::new(active),
        }
    }

    /// Store that keeps nothing past the process
    pub async fn in_memory() -> Self {
        Self::open(MemoryKeyValueStore::new()).await
    }

    /// Read the durable collection
    ///
    /// Waits for queued writes first. Newest first and capped. Missing,
    /// unreadable, or corrupt data yields an empty list.
    pub async fn load_all(&self) -> Vec<Conversation> {
        if let Err(e) = self.writer.flush().await {
            tracing::debug!(error = %e, "Reading durable collection after failed write");
        }
        read_collection(self.backend.as_ref()).await
    }

    /// Wait until every queued write has reached durable storage
    ///
    /// # Errors
    ///
    /// Returns the first write failure since the previous flush.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.writer.flush().await
    }

    /// Snapshot of the in-memory collection, newest first
    #[must_use]
    pub fn list(&self) -> Vec<Conversation> {
        self.conversations.lock().clone()
    }

    /// Look up a conversation
    #[must_use]
    pub fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations
            .lock()
            .iter()
            .find(|c| &c.id == id)
            .cloned()
    }

    /// Check if a conversation is stored
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.lock().iter().any(|c| &c.id == id)
    }

    /// Number of stored conversations
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.lock().len()
    }

    /// Check if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.lock().is_empty()
    }

    /// Latest `updated_at` among conversations other than `id`
    #[must_use]
    pub fn newest_update_except(&self, id: &ConversationId) -> Option<u64> {
        self.conversations
            .lock()
            .iter()
            .filter(|c| &c.id != id)
            .map(|c| c.updated_at)
            .max()
    }

    /// Insert or replace a conversation
    ///
    /// The collection is re-sorted newest first and anything past
    /// [`MAX_CONVERSATIONS`] is evicted, then queued for the durable mirror.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be queued. The in-memory
    /// collection is updated regardless.
    pub fn upsert(&self, conversation: Conversation) -> Result<(), StoreError> {
        let mut conversations = self.conversations.lock();

        conversations.retain(|c| c.id != conversation.id);
        conversations.insert(0, conversation);
        // Stable: among equal timestamps the entry just written stays first.
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        if conversations.len() > MAX_CONVERSATIONS {
            for evicted in conversations.drain(MAX_CONVERSATIONS..) {
                tracing::debug!(conversation_id = %evicted.id, "Evicting conversation");
            }
        }

        self.persist(&conversations)
    }

    /// Remove a conversation
    ///
    /// Returns `Ok(false)` without writing when the id is not stored. Clearing
    /// the active pointer is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be queued. The in-memory
    /// removal stands.
    pub fn delete(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let mut conversations = self.conversations.lock();

        let before = conversations.len();
        conversations.retain(|c| &c.id != id);
        if conversations.len() == before {
            return Ok(false);
        }

        self.persist(&conversations)?;
        Ok(true)
    }

    /// The active conversation id as last saved
    #[must_use]
    pub fn load_active_id(&self) -> Option<ConversationId> {
        self.active.lock().clone()
    }

    /// Save the active conversation id, or clear it
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be queued.
    pub fn save_active_id(&self, id: Option<&ConversationId>) -> Result<(), StoreError> {
        let mut active = self.active.lock();
        *active = id.cloned();
        match id {
            Some(id) => self
                .writer
                .set(ACTIVE_CONVERSATION_KEY, id.as_str().to_string()),
            None => self.writer.remove(ACTIVE_CONVERSATION_KEY),
        }
    }

    fn persist(&self, conversations: &[Conversation]) -> Result<(), StoreError> {
        let json = serde_json::to_string(conversations)?;
        self.writer.set(CONVERSATIONS_KEY, json)
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("conversations", &self.len())
            .finish_non_exhaustive()
    }
}

async fn read_collection(backend: &dyn KeyValueStore) -> Vec<Conversation> {
    let raw = match backend.get(CONVERSATIONS_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read conversations, starting empty");
            return Vec::new();
        }
    };

    let mut conversations: Vec<Conversation> = match serde_json::from_str(&raw) {
        Ok(conversations) => conversations,
        Err(e) => {
            tracing::warn!(error = %e, "Stored conversations are corrupt, starting empty");
            return Vec::new();
        }
    };

    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    conversations.truncate(MAX_CONVERSATIONS);
    conversations
}

/// Read failures and blank values degrade to `None`
async fn read_active_id(backend: &dyn KeyValueStore) -> Option<ConversationId> {
    match backend.get(ACTIVE_CONVERSATION_KEY).await {
        Ok(Some(raw)) => {
            let raw = raw.trim();
            (!raw.is_empty()).then(|| ConversationId::from(raw))
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read active conversation");
            None
        }
    }
}
