//! Chat Transport Integration
//!
//! Abstracted access to chat-completion endpoints through a common trait.
//!
//! # Available Transports
//!
//! - **HTTP**: OpenAI-compatible streaming endpoint over `reqwest` (default)
//!
//! # Usage
//!
//! ```ignore
//! use chatstream_core::backend::{ChatTransport, HttpTransport};
//! use chatstream_core::messages::{ChatRequest, Message, ModelSelector};
//!
//! let transport = HttpTransport::from_config(&config)?;
//! let request = ChatRequest::from_history(&ModelSelector::Auto, &[Message::user("Hi")]);
//! let response = transport.open_stream(&request).await?;
//! ```

mod http;
mod traits;

pub use http::HttpTransport;
pub use traits::{ChatTransport, FragmentStream, ModelInfo, TransportError, TransportResponse};
