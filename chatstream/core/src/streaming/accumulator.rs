//! Delta Accumulator
//!
//! Interprets event payloads as content deltas and rebuilds the assistant
//! reply. Each accepted delta yields the *full* accumulated content so
//! consumers replace what they display instead of appending to it.

use serde::Deserialize;

/// One chunk of a streamed completion
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionChunk {
    fn into_delta(self) -> Option<String> {
        self.choices.into_iter().next()?.delta?.content
    }
}

/// Running buffer of assistant content
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    /// Concatenation of every accepted delta, in arrival order
    content: String,
    /// Deltas appended so far
    deltas_applied: u64,
    /// Payloads that failed to parse
    events_ignored: u64,
}

impl DeltaAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event payload
    ///
    /// Returns the full accumulated content when the payload carried a
    /// non-empty delta. Malformed payloads and payloads without a delta
    /// return `None` and leave the buffer untouched.
    pub fn apply(&mut self, payload: &str) -> Option<&str> {
        let chunk = match serde_json::from_str::<CompletionChunk>(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.events_ignored = self.events_ignored.saturating_add(1);
                tracing::trace!(error = %e, "Ignoring malformed stream event");
                return None;
            }
        };

        let delta = chunk.into_delta().filter(|d| !d.is_empty())?;
        self.content.push_str(&delta);
        self.deltas_applied = self.deltas_applied.saturating_add(1);
        Some(self.content.as_str())
    }

    /// Current accumulated content
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Check if no content has been accumulated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Number of deltas appended
    #[must_use]
    pub fn deltas_applied(&self) -> u64 {
        self.deltas_applied
    }

    /// Number of payloads ignored as malformed
    #[must_use]
    pub fn events_ignored(&self) -> u64 {
        self.events_ignored
    }

    /// Take the accumulated content
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        serde_json::json!({ "choices": [{ "delta": { "content": text } }] }).to_string()
    }

    #[test]
    fn test_reports_full_buffer() {
        let mut acc = DeltaAccumulator::new();
        assert_eq!(acc.apply(&delta("Hi")), Some("Hi"));
        assert_eq!(acc.apply(&delta(" there")), Some("Hi there"));
        assert_eq!(acc.content(), "Hi there");
        assert_eq!(acc.deltas_applied(), 2);
    }

    #[test]
    fn test_counters_saturate() {
        let mut acc = DeltaAccumulator {
            deltas_applied: u64::MAX,
            events_ignored: u64::MAX,
            ..DeltaAccumulator::default()
        };
        assert_eq!(acc.apply(&delta("x")), Some("x"));
        assert_eq!(acc.apply("not json"), None);
        assert_eq!(acc.deltas_applied(), u64::MAX);
        assert_eq!(acc.events_ignored(), u64::MAX);
    }

    #[test]
    fn test_delta_appended_verbatim() {
        let mut acc = DeltaAccumulator::new();
        acc.apply(&delta("  leading"));
        acc.apply(&delta("\n\ttrailing  "));
        assert_eq!(acc.content(), "  leading\n\ttrailing  ");
    }

    #[test]
    fn test_missing_or_empty_delta_is_noop() {
        let mut acc = DeltaAccumulator::new();
        assert_eq!(acc.apply(r#"{"choices":[{"delta":{}}]}"#), None);
        assert_eq!(acc.apply(r#"{"choices":[{"delta":{"content":null}}]}"#), None);
        assert_eq!(acc.apply(r#"{"choices":[{"delta":{"content":""}}]}"#), None);
        assert_eq!(acc.apply(r#"{"choices":[{"finish_reason":"stop"}]}"#), None);
        assert_eq!(acc.apply(r#"{"choices":[]}"#), None);
        assert_eq!(acc.apply(r#"{"id":"chunk-1"}"#), None);
        assert!(acc.is_empty());
        assert_eq!(acc.events_ignored(), 0);
    }

    #[test]
    fn test_malformed_payloads_ignored() {
        let mut acc = DeltaAccumulator::new();
        assert_eq!(acc.apply("not json"), None);
        assert_eq!(acc.apply("{\"choices\":[{\"delta\":"), None);
        assert_eq!(acc.apply(r#"{"choices":"nope"}"#), None);
        assert_eq!(acc.apply(r#"{"choices":[{"delta":{"content":42}}]}"#), None);
        assert!(acc.is_empty());
        assert_eq!(acc.events_ignored(), 4);
    }

    #[test]
    fn test_interleaved_malformed_events_do_not_change_result() {
        let valid = ["The ", "quick ", "brown ", "fox"];
        let malformed = ["garbage", "{", r#"{"choices":7}"#, "[1,2"];

        // Insert every malformed payload at every position in turn.
        for offset in 0..=valid.len() {
            let mut payloads: Vec<String> = valid.iter().map(|v| delta(v)).collect();
            for (i, bad) in malformed.iter().enumerate() {
                let at = (offset + i * 2).min(payloads.len());
                payloads.insert(at, (*bad).to_string());
            }

            let mut acc = DeltaAccumulator::new();
            for payload in &payloads {
                acc.apply(payload);
            }
            assert_eq!(acc.content(), "The quick brown fox", "offset {offset}");
            assert_eq!(acc.events_ignored(), 4);
        }
    }

    #[test]
    fn test_only_first_choice_is_read() {
        let mut acc = DeltaAccumulator::new();
        let payload = r#"{"choices":[{"delta":{"content":"a"}},{"delta":{"content":"b"}}]}"#;
        assert_eq!(acc.apply(payload), Some("a"));
    }
}
