//! Transport Traits
//!
//! The boundary between the streaming engine and the network. A transport
//! opens one streaming request and hands back the response status together
//! with the raw body as a stream of byte fragments; decoding and accumulation
//! are the engine's job, not the transport's.
//!
//! # Design Philosophy
//!
//! The `ChatTransport` trait keeps the engine testable: integration tests
//! script a transport that yields chosen fragments at chosen boundaries, while
//! production uses [`HttpTransport`](super::HttpTransport) over `reqwest`.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use crate::messages::ChatRequest;

/// Raw response body, delivered as fragments in arrival order
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Errors raised by a transport
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The configured endpoint is not an HTTP(S) URL
    #[error("invalid endpoint '{0}': expected an http:// or https:// URL")]
    InvalidEndpoint(String),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The request could not be sent (connection refused, DNS, timeout)
    #[error("{0}")]
    Request(String),

    /// Reading the response body failed part-way through
    #[error("stream interrupted: {0}")]
    Body(String),
}

/// Response to a streaming request
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body fragments
    pub body: FragmentStream,
}

impl TransportResponse {
    /// Create a response from a status code and a body stream
    pub fn new(status: u16, body: FragmentStream) -> Self {
        Self { status, body }
    }

    /// Check for a 2xx status
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// A model advertised by the server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier, usable as a `ModelSelector::Named` value
    pub id: String,
    /// Owner reported by the server, if any
    pub owned_by: Option<String>,
}

/// Chat transport trait
///
/// Implement this to connect the engine to a chat-completion endpoint.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Send a streaming request
    ///
    /// Resolves once response headers arrive. Non-2xx statuses are returned
    /// as a normal [`TransportResponse`]; only failures to obtain a response
    /// at all are errors.
    async fn open_stream(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError>;

    /// Check if the endpoint is reachable
    async fn health_check(&self) -> bool {
        true
    }

    /// List models the server offers
    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        Ok(Vec::new())
    }
}
