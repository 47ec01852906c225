//! Chunk Decoder
//!
//! Turns raw body fragments into event payloads. Network reads split the
//! event stream at arbitrary byte positions, so the decoder keeps the
//! unterminated tail of the previous fragment and only ever emits complete
//! lines.

/// Prefix marking an event line
pub const EVENT_MARKER: &str = "data:";

/// Payload that marks the logical end of a stream
pub const DONE_TOKEN: &str = "[DONE]";

/// Incremental line decoder for `data:` event streams
///
/// Buffers bytes rather than text so a multi-byte character split across two
/// fragments decodes the same as if it had arrived whole.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    /// Bytes received but not yet terminated by a newline
    buffer: Vec<u8>,
}

impl ChunkDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a fragment and iterate the payloads it completes
    ///
    /// The returned iterator is lazy: lines are split off the buffer as it is
    /// advanced. Lines it does not reach stay buffered for the next call.
    pub fn push(&mut self, fragment: &[u8]) -> DecodedEvents<'_> {
        self.buffer.extend_from_slice(fragment);
        DecodedEvents {
            decoder: self,
            consumed: 0,
        }
    }

    /// Feed a text fragment
    pub fn push_str(&mut self, fragment: &str) -> DecodedEvents<'_> {
        self.push(fragment.as_bytes())
    }

    /// Bytes currently held as carry-over
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// End the stream, discarding any unterminated trailing line
    ///
    /// Returns the number of bytes discarded.
    pub fn finish(self) -> usize {
        let discarded = self.buffer.len();
        if discarded > 0 {
            tracing::debug!(bytes = discarded, "Discarding unterminated trailing line");
        }
        discarded
    }
}

/// Payloads completed by one [`ChunkDecoder::push`]
pub struct DecodedEvents<'a> {
    decoder: &'a mut ChunkDecoder,
    consumed: usize,
}

impl Iterator for DecodedEvents<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let rest = &self.decoder.buffer[self.consumed..];
            let pos = rest.iter().position(|&b| b == b'\n')?;
            let line = String::from_utf8_lossy(&rest[..pos]).into_owned();
            self.consumed += pos + 1;

            if let Some(payload) = parse_line(&line) {
                return Some(payload.to_string());
            }
        }
    }
}

impl Drop for DecodedEvents<'_> {
    fn drop(&mut self) {
        self.decoder.buffer.drain(..self.consumed);
    }
}

/// Extract the payload from one complete line
///
/// Returns `None` for blank lines, lines without the event marker, and the
/// termination token.
#[must_use]
pub fn parse_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let payload = line.strip_prefix(EVENT_MARKER)?.trim_start();
    if payload == DONE_TOKEN {
        return None;
    }

    Some(payload)
}
