//! Conversation Controller
//!
//! Turns user intent (send, cancel, new, switch, delete) into stream
//! sessions and store writes. The controller owns the message list on
//! screen and keeps the active conversation's stored copy in step with it:
//! every change to the list is written back through
//! [`ConversationStore::upsert`].
//!
//! # Driving a Response
//!
//! [`send_message`](ConversationController::send_message) starts a session
//! and returns immediately. The owner then either polls
//! ([`poll_streaming`](ConversationController::poll_streaming), for render
//! loops) or awaits ([`next_update`](ConversationController::next_update))
//! until the state is terminal.
//!
//! ```ignore
//! controller.send_message("Hello");
//! while let Some(state) = controller.next_update().await {
//!     render(controller.messages());
//!     if state.is_terminal() {
//!         break;
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::backend::ChatTransport;
use crate::config::ChatConfig;
use crate::conversation::{now_ms, Conversation};
use crate::messages::{
    ChatRequest, ConversationId, Message, MessageRole, ModelSelector, EMPTY_RESPONSE_NOTICE,
};
use crate::store::ConversationStore;
use crate::streaming::{SessionEvent, StreamSession, StreamState, DEFAULT_CHANNEL_CAPACITY};

/// Controller settings
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Model carried in every request
    pub model: ModelSelector,
    /// Capacity of each session's event channel
    pub channel_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            model: ModelSelector::Auto,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl From<&ChatConfig> for ControllerConfig {
    fn from(config: &ChatConfig) -> Self {
        Self {
            model: config.model.clone(),
            channel_capacity: config.channel_capacity,
        }
    }
}

/// Bridges user actions to stream sessions and conversation storage
pub struct ConversationController<T: ChatTransport + ?Sized + 'static> {
    /// Transport shared with running sessions
    transport: Arc<T>,
    /// Conversation history
    store: ConversationStore,
    /// Model for the next request
    model: ModelSelector,
    /// Session event channel capacity
    channel_capacity: usize,
    /// Messages on screen, oldest first
    messages: Vec<Message>,
    /// Stored conversation backing `messages`; `None` until the first send
    active_id: Option<ConversationId>,
    /// Creation time of the active conversation
    created_at: Option<u64>,
    /// In-flight or most recent unfinished session
    session: Option<StreamSession>,
    /// State of the current or last session
    state: StreamState,
    /// Banner text from the last failed request
    error: Option<String>,
}

impl<T: ChatTransport + ?Sized + 'static> ConversationController<T> {
    /// Create a controller, restoring the conversation that was active last
    ///
    /// A stored pointer to a conversation that no longer exists is cleared
    /// and a fresh conversation begins.
    pub fn new(transport: Arc<T>, store: ConversationStore, config: ControllerConfig) -> Self {
        let mut controller = Self {
            transport,
            store,
            model: config.model,
            channel_capacity: config.channel_capacity,
            messages: vec![Message::greeting()],
            active_id: None,
            created_at: None,
            session: None,
            state: StreamState::Idle,
            error: None,
        };

        if let Some(id) = controller.store.load_active_id() {
            match controller.store.get(&id) {
                Some(conversation) => {
                    tracing::info!(conversation_id = %id, "Restored active conversation");
                    controller.load(conversation);
                }
                None => {
                    tracing::warn!(conversation_id = %id, "Active conversation no longer stored");
                    controller.save_active_id(None);
                }
            }
        }

        controller
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Messages on screen, oldest first
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// State of the current or last session
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Check if a request is in flight
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.session.as_ref().is_some_and(StreamSession::is_active)
    }

    /// Banner text from the last failed request
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Clear the error banner
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Conversation on screen, if it has been stored
    #[must_use]
    pub fn active_conversation_id(&self) -> Option<&ConversationId> {
        self.active_id.as_ref()
    }

    /// Stored conversations, most recently updated first
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.store.list()
    }

    /// Model used for the next request
    #[must_use]
    pub fn model(&self) -> &ModelSelector {
        &self.model
    }

    /// Change the model for subsequent requests
    pub fn set_model(&mut self, model: ModelSelector) {
        tracing::debug!(model = %model, "Model selected");
        self.model = model;
    }

    /// Conversation history
    #[must_use]
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Transport used for requests
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Wait until history changes so far have reached durable storage
    ///
    /// Call before exiting so queued writes are not lost with the runtime.
    /// Write failures are logged and otherwise ignored.
    pub async fn flush(&self) {
        if let Err(e) = self.store.flush().await {
            tracing::warn!(error = %e, "Failed to persist history");
        }
    }

    // =========================================================================
    // User Actions
    // =========================================================================

    /// Send a user message and start streaming the reply
    ///
    /// Returns `false` without effect when `text` is blank or a response is
    /// already in flight. Must be called from within a Tokio runtime.
    pub fn send_message(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.is_streaming() {
            return false;
        }

        if self.active_id.is_none() {
            let id = ConversationId::new();
            tracing::info!(conversation_id = %id, "Starting conversation");
            self.save_active_id(Some(&id));
            self.active_id = Some(id);
            self.created_at = Some(now_ms());
        }

        self.error = None;
        self.messages.push(Message::user(text));
        self.persist();

        let request = ChatRequest::from_history(&self.model, &self.messages);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending message"
        );

        self.session = Some(StreamSession::start(
            Arc::clone(&self.transport),
            request,
            self.channel_capacity,
        ));
        self.state = StreamState::Sending;
        true
    }

    /// Cancel the in-flight response
    ///
    /// The message list stays exactly as last observed. Returns `false` if
    /// nothing was in flight.
    pub fn cancel(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };

        if session.cancel() {
            self.state = StreamState::Cancelled;
            tracing::info!("Response cancelled");
            true
        } else {
            false
        }
    }

    /// Start a fresh conversation
    pub fn new_conversation(&mut self) {
        self.cancel();
        self.messages = vec![Message::greeting()];
        self.active_id = None;
        self.created_at = None;
        self.reset_transient();
        self.save_active_id(None);
    }

    /// Show a stored conversation
    ///
    /// Returns `false` if no conversation has that id.
    pub fn switch_conversation(&mut self, id: &ConversationId) -> bool {
        let Some(conversation) = self.store.get(id) else {
            return false;
        };

        self.cancel();
        self.load(conversation);
        self.reset_transient();
        self.save_active_id(Some(id));
        tracing::debug!(conversation_id = %id, "Switched conversation");
        true
    }

    /// Delete a stored conversation
    ///
    /// Deleting the conversation on screen starts a fresh one. Returns
    /// `false` if no conversation has that id.
    pub fn delete_conversation(&mut self, id: &ConversationId) -> bool {
        let existed = self.store.contains(id);
        if let Err(e) = self.store.delete(id) {
            tracing::warn!(conversation_id = %id, error = %e, "Failed to persist deletion");
        }

        if self.active_id.as_ref() == Some(id) {
            self.new_conversation();
        }
        existed
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Apply every session event that is ready, without waiting
    ///
    /// Returns `true` if anything changed.
    pub fn poll_streaming(&mut self) -> bool {
        let mut events = Vec::new();
        if let Some(session) = self.session.as_mut() {
            while let Some(event) = session.try_next() {
                events.push(event);
            }
        }

        if events.is_empty() {
            return false;
        }

        for event in events {
            self.apply_event(event);
        }
        true
    }

    /// Wait for the next session event and apply it
    ///
    /// Returns the resulting state, or `None` when nothing is in flight.
    /// Cancel-safe.
    pub async fn next_update(&mut self) -> Option<StreamState> {
        let event = self.session.as_mut()?.next().await?;
        self.apply_event(event);
        Some(self.state)
    }

    fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened => {
                self.messages.push(Message::assistant(String::new()));
                self.state = StreamState::Streaming;
            }
            SessionEvent::Content(content) => {
                self.replace_streaming_content(content);
            }
            SessionEvent::Finished { content } => {
                if content.is_empty() {
                    tracing::warn!("Server returned an empty response");
                    self.replace_streaming_content(EMPTY_RESPONSE_NOTICE.to_string());
                }
                self.state = StreamState::Finalized;
                self.session = None;
            }
            SessionEvent::Failed { error } => {
                tracing::warn!(error = %error, "Response failed");
                self.messages
                    .push(Message::assistant(format!("Error: {error}")));
                self.error = Some(error);
                self.state = StreamState::Failed;
                self.session = None;
            }
        }

        self.persist();
    }

    /// Replace the content of the assistant slot opened for this response
    fn replace_streaming_content(&mut self, content: String) {
        match self.messages.last_mut() {
            Some(last) if last.role == MessageRole::Assistant && !last.synthetic => {
                last.content = content;
            }
            _ => tracing::warn!("No assistant message to stream into"),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn load(&mut self, conversation: Conversation) {
        self.messages = if conversation.messages.is_empty() {
            vec![Message::greeting()]
        } else {
            conversation.messages
        };
        self.active_id = Some(conversation.id);
        self.created_at = Some(conversation.created_at);
    }

    fn reset_transient(&mut self) {
        self.error = None;
        self.state = StreamState::Idle;
    }

    /// Write the message list back to the active conversation
    fn persist(&self) {
        let Some(id) = self.active_id.clone() else {
            return;
        };

        let now = now_ms();
        // Keep the active conversation newest so a full store never evicts it.
        let updated_at = self
            .store
            .newest_update_except(&id)
            .map_or(now, |newest| now.max(newest.saturating_add(1)));
        let conversation = Conversation::from_messages(
            id,
            self.messages.clone(),
            self.created_at.unwrap_or(now),
            updated_at,
        );
        if let Err(e) = self.store.upsert(conversation) {
            tracing::warn!(error = %e, "Failed to persist conversation");
        }
    }

    fn save_active_id(&self, id: Option<&ConversationId>) {
        if let Err(e) = self.store.save_active_id(id) {
            tracing::warn!(error = %e, "Failed to persist active conversation");
        }
    }
}

impl<T: ChatTransport + ?Sized + 'static> std::fmt::Debug for ConversationController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationController")
            .field("transport", &self.transport.name())
            .field("active_id", &self.active_id)
            .field("messages", &self.messages.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
