//! Streaming Pipeline
//!
//! ```text
//! body fragments ─▶ ChunkDecoder ─▶ payloads ─▶ DeltaAccumulator ─▶ full content
//!                   (line framing)              (delta parsing)
//! ```
//!
//! [`StreamSession`] runs the pipeline for one request on a background task
//! and reports [`SessionEvent`]s to its owner.

mod accumulator;
mod decoder;
mod session;

pub use accumulator::DeltaAccumulator;
pub use decoder::{parse_line, ChunkDecoder, DecodedEvents, DONE_TOKEN, EVENT_MARKER};
pub use session::{
    extract_error_message, SessionEvent, StreamSession, StreamState, DEFAULT_CHANNEL_CAPACITY,
};
