//! Chatstream Core - Streaming Chat-Completion Client
//!
//! This crate holds everything a chat front end needs below the screen:
//! issuing streaming completion requests, decoding the event stream into a
//! growing assistant reply, and keeping a bounded history of conversations.
//! It has no terminal or UI dependencies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                  Front end (CLI, TUI, headless)                   │
//! │          send / cancel / new / switch / delete / poll             │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │                      CHATSTREAM CORE                              │
//! │  ┌────────────────────────────┴───────────────────────────────┐  │
//! │  │                 ConversationController                      │  │
//! │  │  ┌───────────────────────┐        ┌──────────────────────┐ │  │
//! │  │  │     StreamSession     │        │  ConversationStore   │ │  │
//! │  │  │ ChunkDecoder          │        │  (max 20, newest     │ │  │
//! │  │  │   → DeltaAccumulator  │        │   first)             │ │  │
//! │  │  └───────────┬───────────┘        └──────────┬───────────┘ │  │
//! │  └──────────────┼───────────────────────────────┼─────────────┘  │
//! │                 │                               │                │
//! │          ChatTransport                   KeyValueStore           │
//! │        (HttpTransport)          (FileKeyValueStore / memory)     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ConversationController`]: Owns the on-screen message list and drives everything else
//! - [`StreamSession`]: One request/response cycle with cooperative cancellation
//! - [`ChunkDecoder`]: Reassembles `data:` lines across arbitrary fragment boundaries
//! - [`DeltaAccumulator`]: Builds the full reply from content deltas
//! - [`ConversationStore`]: Bounded, recency-ordered conversation history
//! - [`ChatTransport`]: Boundary to the completion server
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use chatstream_core::{
//!     config::load_config, ControllerConfig, ConversationController, ConversationStore,
//!     FileKeyValueStore, HttpTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let transport = Arc::new(HttpTransport::from_config(&config)?);
//!     let store = ConversationStore::open(FileKeyValueStore::new(&config.data_dir)).await;
//!     let mut controller =
//!         ConversationController::new(transport, store, ControllerConfig::from(&config));
//!
//!     controller.send_message("Hello!");
//!     while let Some(state) = controller.next_update().await {
//!         if state.is_terminal() {
//!             break;
//!         }
//!     }
//!     println!("{}", controller.messages().last().map_or("", |m| m.content.as_str()));
//!     controller.flush().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod messages;
pub mod store;
pub mod streaming;

// Re-export commonly used types
pub use backend::{
    ChatTransport, FragmentStream, HttpTransport, ModelInfo, TransportError, TransportResponse,
};
pub use config::{ChatConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use controller::{ControllerConfig, ConversationController};
pub use conversation::Conversation;
pub use messages::{
    ChatRequest, ConversationId, Message, MessageRole, ModelSelector, EMPTY_RESPONSE_NOTICE,
    GREETING,
};
pub use store::{
    ConversationStore, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, StoreError,
    MAX_CONVERSATIONS,
};
pub use streaming::{ChunkDecoder, DeltaAccumulator, SessionEvent, StreamSession, StreamState};
