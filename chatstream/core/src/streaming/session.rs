//! Stream Session
//!
//! One request/response cycle. Starting a session spawns a task that opens
//! the transport, drives [`ChunkDecoder`] and [`DeltaAccumulator`] over the
//! body, and reports progress as [`SessionEvent`]s on a bounded channel. The
//! owner applies those events to its message list at its own pace.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ─start─▶ Sending ─2xx─▶ Streaming ─EOF─▶ Finalized
//!                  │               │
//!                  └──non-2xx / transport error──▶ Failed
//!
//! Sending | Streaming ─cancel─▶ Cancelled
//! ```
//!
//! Cancellation is cooperative: it trips a [`CancellationToken`] that the
//! task races against every pending read, and closes the event channel so
//! nothing produced after the cancel is ever observed.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::accumulator::DeltaAccumulator;
use super::decoder::ChunkDecoder;
use crate::backend::{ChatTransport, FragmentStream};
use crate::messages::ChatRequest;

/// Default capacity of the session event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Session lifecycle state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamState {
    /// No request issued
    #[default]
    Idle,
    /// Request issued, waiting for response headers
    Sending,
    /// Response accepted, tokens arriving
    Streaming,
    /// Stream ended normally
    Finalized,
    /// Stopped by the owner
    Cancelled,
    /// Request rejected or transport failed
    Failed,
}

impl StreamState {
    /// Check if the session has ended
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled | Self::Failed)
    }

    /// Check if a request is in flight
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    /// Check if moving to `next` is a legal transition
    #[must_use]
    pub fn can_transition_to(&self, next: StreamState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Sending | Self::Cancelled)
                | (Self::Sending, Self::Streaming | Self::Failed | Self::Cancelled)
                | (
                    Self::Streaming,
                    Self::Streaming | Self::Finalized | Self::Failed | Self::Cancelled
                )
        )
    }

    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Sending => "Sending...",
            Self::Streaming => "Responding...",
            Self::Finalized => "Done",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }
}

/// Progress reported by a running session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A 2xx response arrived; the assistant slot should exist from now on
    Opened,
    /// Full accumulated content after a new delta
    Content(String),
    /// Body ended; `content` is the final accumulated buffer (possibly empty)
    Finished {
        /// Final content
        content: String,
    },
    /// Request rejected or transport failed
    Failed {
        /// User-facing error text
        error: String,
    },
}

impl SessionEvent {
    fn next_state(&self) -> StreamState {
        match self {
            Self::Opened | Self::Content(_) => StreamState::Streaming,
            Self::Finished { .. } => StreamState::Finalized,
            Self::Failed { .. } => StreamState::Failed,
        }
    }
}

/// A single in-flight request
///
/// Owned exclusively by its controller. Dropping a session cancels it.
pub struct StreamSession {
    /// Current lifecycle state
    state: StreamState,
    /// Events from the background task
    events: mpsc::Receiver<SessionEvent>,
    /// Trips the background task's pending read
    cancel: CancellationToken,
    /// Background task driving the transport
    task: JoinHandle<()>,
}

impl StreamSession {
    /// Issue `request` on `transport` and start streaming in the background
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<T>(transport: Arc<T>, request: ChatRequest, channel_capacity: usize) -> Self
    where
        T: ChatTransport + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_session(transport, request, tx, cancel.clone()));

        Self {
            state: StreamState::Sending,
            events: rx,
            cancel,
            task,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Check if the session is still sending or streaming
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Take the next event without waiting
    ///
    /// Returns `None` when nothing is ready or the session has ended.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        if self.state.is_terminal() {
            return None;
        }

        match self.events.try_recv() {
            Ok(event) => Some(self.observe(event)),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => Some(self.disconnected()),
        }
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the session has ended. Cancel-safe.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        if self.state.is_terminal() {
            return None;
        }

        match self.events.recv().await {
            Some(event) => Some(self.observe(event)),
            None => Some(self.disconnected()),
        }
    }

    /// Cancel the session
    ///
    /// Returns `false` without effect if the session has already ended.
    /// Events the task produced but the owner has not yet taken are dropped.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        self.cancel.cancel();
        self.events.close();
        self.state = StreamState::Cancelled;
        tracing::debug!("Stream session cancelled");
        true
    }

    fn observe(&mut self, event: SessionEvent) -> SessionEvent {
        let next = event.next_state();
        debug_assert!(self.state.can_transition_to(next));
        self.state = next;
        event
    }

    fn disconnected(&mut self) -> SessionEvent {
        // The task always ends with a terminal event unless it panicked.
        self.state = StreamState::Failed;
        SessionEvent::Failed {
            error: "Stream ended unexpectedly".to_string(),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Build the user-facing message for a non-2xx response
///
/// Accepts `{"error": "..."}` and `{"error": {"message": "..."}}` bodies;
/// anything else falls back to a status-code message.
#[must_use]
pub fn extract_error_message(status: u16, body: &[u8]) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_slice(body).ok();

    if let Some(error) = parsed.as_ref().and_then(|v| v.get("error")) {
        if let Some(text) = error.as_str().filter(|t| !t.is_empty()) {
            return text.to_string();
        }
        if let Some(text) = error
            .get("message")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
        {
            return text.to_string();
        }
    }

    format!("Request failed with status {status}")
}

/// Send an event; `false` once the owner has stopped listening
async fn emit(tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) -> bool {
    tx.send(event).await.is_ok()
}

/// Read a whole error body, stopping early on cancellation or a read error
async fn read_error_body(body: &mut FragmentStream, cancel: &CancellationToken) -> Option<Vec<u8>> {
    let mut collected = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            next = body.next() => next,
        };
        match next {
            Some(Ok(fragment)) => collected.extend_from_slice(&fragment),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Error body read failed");
                break;
            }
            None => break,
        }
    }
    Some(collected)
}

async fn run_session<T>(
    transport: Arc<T>,
    request: ChatRequest,
    tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) where
    T: ChatTransport + ?Sized,
{
    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        response = transport.open_stream(&request) => response,
    };

    let mut response = match response {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(transport = transport.name(), error = %e, "Request failed");
            emit(&tx, SessionEvent::Failed { error: e.to_string() }).await;
            return;
        }
    };

    if !response.is_success() {
        let Some(body) = read_error_body(&mut response.body, &cancel).await else {
            return;
        };
        let error = extract_error_message(response.status, &body);
        tracing::warn!(status = response.status, error = %error, "Server rejected request");
        emit(&tx, SessionEvent::Failed { error }).await;
        return;
    }

    tracing::debug!(status = response.status, "Stream opened");
    if !emit(&tx, SessionEvent::Opened).await {
        return;
    }

    let mut body = response.body;
    let mut decoder = ChunkDecoder::new();
    let mut accumulator = DeltaAccumulator::new();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            next = body.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                for payload in decoder.push(&fragment) {
                    if let Some(content) = accumulator.apply(&payload) {
                        let update = SessionEvent::Content(content.to_string());
                        if !emit(&tx, update).await {
                            return;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Stream read failed");
                emit(&tx, SessionEvent::Failed { error: e.to_string() }).await;
                return;
            }
            None => break,
        }
    }

    decoder.finish();
    tracing::debug!(
        deltas = accumulator.deltas_applied(),
        ignored = accumulator.events_ignored(),
        "Stream finished"
    );
    emit(
        &tx,
        SessionEvent::Finished {
            content: accumulator.into_content(),
        },
    )
    .await;
}
