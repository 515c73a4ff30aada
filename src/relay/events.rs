//! SSE event parsing.
//!
//! Turns decoded lines into typed [`StreamEvent`]s per the
//! OpenAI-compatible streaming convention: only `data:` lines carry
//! payloads, `[DONE]` is the authoritative terminator, and one bad frame
//! never aborts the stream.

use serde::Deserialize;

/// One parsed event from the provider's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental fragment of assistant output. Order-significant:
    /// concatenating all deltas in arrival order reconstructs the message.
    DeltaText { text: String },
    /// Terminal `[DONE]` sentinel. At most one per stream, always last.
    StreamEnd,
    /// A `data:` payload that failed to parse. Non-fatal; skipped.
    Malformed { raw: String },
}

/// Streaming chunk response (OpenAI-compatible), delta schema only.
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

/// A streaming choice delta.
#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

/// Delta content in a streaming chunk.
#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Stateful line-to-event parser.
///
/// Latches on `[DONE]`: once the terminator is observed, every subsequent
/// line yields nothing, regardless of what the provider sends after it.
pub struct EventParser {
    done: bool,
}

impl EventParser {
    pub fn new() -> Self {
        Self { done: false }
    }

    /// Whether the terminator has been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Parse one complete line.
    ///
    /// Returns `None` for insignificant lines: blanks, SSE `event:`/`id:`/
    /// `retry:` fields, comments, deltas with empty or absent content, and
    /// anything after `[DONE]`.
    pub fn parse_line(&mut self, line: &str) -> Option<StreamEvent> {
        if self.done {
            return None;
        }

        // Providers emit both "data: " and "data:"; accept either.
        let payload = line.strip_prefix("data:")?.trim();

        if payload == "[DONE]" {
            self.done = true;
            return Some(StreamEvent::StreamEnd);
        }

        match serde_json::from_str::<ChatCompletionChunk>(payload) {
            Ok(chunk) => {
                let content = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|text| !text.is_empty())?;
                Some(StreamEvent::DeltaText { text: content })
            }
            Err(_) => Some(StreamEvent::Malformed {
                raw: payload.to_string(),
            }),
        }
    }
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(lines: &[&str]) -> Vec<StreamEvent> {
        let mut parser = EventParser::new();
        lines
            .iter()
            .filter_map(|line| parser.parse_line(line))
            .collect()
    }

    #[test]
    fn delta_content_extracted() {
        let events = parse_all(&[
            r#"data: {"choices":[{"index":0,"delta":{"content":"He"},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"llo"},"finish_reason":null}]}"#,
            "data: [DONE]",
        ]);
        assert_eq!(
            events,
            vec![
                StreamEvent::DeltaText { text: "He".into() },
                StreamEvent::DeltaText { text: "llo".into() },
                StreamEvent::StreamEnd,
            ]
        );
    }

    #[test]
    fn non_data_lines_ignored() {
        let events = parse_all(&[
            "",
            "event: message",
            "id: 123",
            "retry: 5000",
            ": comment",
            "data: [DONE]",
        ]);
        assert_eq!(events, vec![StreamEvent::StreamEnd]);
    }

    #[test]
    fn data_without_space_accepted() {
        let events = parse_all(&[
            r#"data:{"choices":[{"delta":{"content":"Hi"}}]}"#,
            "data:[DONE]",
        ]);
        assert_eq!(
            events,
            vec![
                StreamEvent::DeltaText { text: "Hi".into() },
                StreamEvent::StreamEnd,
            ]
        );
    }

    #[test]
    fn malformed_payload_yields_malformed_event() {
        let events = parse_all(&[
            "data: {this is not valid json}",
            r#"data: {"choices":[{"delta":{"content":"ok"}}]}"#,
            "data: [DONE]",
        ]);
        assert_eq!(
            events,
            vec![
                StreamEvent::Malformed {
                    raw: "{this is not valid json}".into()
                },
                StreamEvent::DeltaText { text: "ok".into() },
                StreamEvent::StreamEnd,
            ]
        );
    }

    #[test]
    fn empty_or_absent_content_is_noop() {
        let events = parse_all(&[
            // Role-only first chunk, no content field.
            r#"data: {"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#,
            // Explicit empty content.
            r#"data: {"choices":[{"delta":{"content":""}}]}"#,
            // No choices at all (usage-only final chunk).
            r#"data: {"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":2}}"#,
            "data: [DONE]",
        ]);
        assert_eq!(events, vec![StreamEvent::StreamEnd]);
    }

    #[test]
    fn done_latch_suppresses_trailing_deltas() {
        let events = parse_all(&[
            r#"data: {"choices":[{"delta":{"content":"real"}}]}"#,
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"ghost"}}]}"#,
            "data: [DONE]",
        ]);
        assert_eq!(
            events,
            vec![
                StreamEvent::DeltaText { text: "real".into() },
                StreamEvent::StreamEnd,
            ]
        );
    }

    #[test]
    fn null_content_is_noop() {
        let events = parse_all(&[r#"data: {"choices":[{"delta":{"content":null}}]}"#]);
        assert!(events.is_empty());
    }
}
