//! Relay session state machine and drive loop.
//!
//! One [`RelaySession`] exists per `/api/chat` request. It owns the line
//! decoder and event parser, maps provider events to outbound SSE frames,
//! and accumulates the assistant text so it is available at completion.
//! [`run_relay`] drives the session over the upstream byte source with
//! idle-timeout and cancellation handling.

use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;

use super::decoder::LineDecoder;
use super::events::{EventParser, StreamEvent};
use super::upstream::ByteChunkSource;

/// Lifecycle of one relay operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Streaming,
    Completed,
    Failed,
}

/// One outbound SSE frame on the caller's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `data: {"content": ...}` — an assistant text fragment.
    Delta(String),
    /// `data: [DONE]` — terminal, nothing follows.
    Done,
    /// `data: {"error": ...}` — in-band terminal error, nothing follows.
    Error(String),
}

impl Frame {
    /// Render the frame as wire bytes.
    pub fn to_sse(&self) -> Bytes {
        let rendered = match self {
            Frame::Delta(text) => {
                format!("data: {}\n\n", serde_json::json!({ "content": text }))
            }
            Frame::Done => "data: [DONE]\n\n".to_string(),
            Frame::Error(message) => {
                format!("data: {}\n\n", serde_json::json!({ "error": message }))
            }
        };
        Bytes::from(rendered)
    }
}

/// Live state of one relay operation.
pub struct RelaySession {
    state: SessionState,
    decoder: LineDecoder,
    parser: EventParser,
    accumulated: String,
}

impl RelaySession {
    pub fn new() -> Self {
        Self {
            state: SessionState::NotStarted,
            decoder: LineDecoder::new(),
            parser: EventParser::new(),
            accumulated: String::new(),
        }
    }

    /// Enter `Streaming`. Called once, after request validation passes.
    pub fn start(&mut self) {
        debug_assert_eq!(self.state, SessionState::NotStarted);
        self.state = SessionState::Streaming;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Concatenation, in emission order, of every delta relayed so far.
    /// At `Completed` this is the full assistant message.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    /// Process one upstream byte chunk, returning the frames to write.
    ///
    /// A `[DONE]` inside the chunk produces the terminal frame and moves
    /// the session to `Completed`; anything the provider sends after it is
    /// suppressed by the parser.
    pub fn on_chunk(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for line in self.decoder.push(bytes) {
            self.handle_line(&line, &mut frames);
        }
        frames
    }

    /// Process end-of-input from the upstream.
    ///
    /// Flushes the decoder tail (the provider may omit the final line
    /// terminator), then terminates the outbound stream: if `[DONE]` never
    /// arrived, the terminal frame is still written so the caller always
    /// sees a deterministic end.
    pub fn on_end(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if let Some(line) = std::mem::take(&mut self.decoder).finish() {
            self.handle_line(&line, &mut frames);
        }
        if self.state == SessionState::Streaming {
            self.state = SessionState::Completed;
            frames.push(Frame::Done);
        }
        frames
    }

    /// Record a mid-stream failure, returning the in-band error frame.
    pub fn fail(&mut self, message: &str) -> Frame {
        self.state = SessionState::Failed;
        Frame::Error(message.to_string())
    }

    fn handle_line(&mut self, line: &str, frames: &mut Vec<Frame>) {
        match self.parser.parse_line(line) {
            Some(StreamEvent::DeltaText { text }) => {
                self.accumulated.push_str(&text);
                frames.push(Frame::Delta(text));
            }
            Some(StreamEvent::StreamEnd) => {
                self.state = SessionState::Completed;
                frames.push(Frame::Done);
            }
            Some(StreamEvent::Malformed { raw }) => {
                tracing::warn!(raw = %raw, "Skipping malformed provider frame");
            }
            None => {}
        }
    }
}

impl Default for RelaySession {
    fn default() -> Self {
        Self::new()
    }
}

/// How a relay ended, for logging.
#[derive(Debug)]
pub struct RelayOutcome {
    pub state: SessionState,
    pub accumulated_text: String,
}

/// Drive one relay session over the upstream byte source.
///
/// Each rendered frame is sent into `tx`, whose receiver backs the
/// caller's response body. The loop suspends on two points only: awaiting
/// the next upstream chunk (bounded by `idle_timeout`) and awaiting the
/// channel send. A closed channel means the caller disconnected; the loop
/// stops and dropping `source` aborts the outbound request.
pub async fn run_relay(
    mut source: ByteChunkSource,
    idle_timeout: Duration,
    tx: mpsc::Sender<Bytes>,
) -> RelayOutcome {
    let mut session = RelaySession::new();
    session.start();

    loop {
        let frames = match tokio::time::timeout(idle_timeout, source.next()).await {
            Err(_) => {
                tracing::error!(
                    idle_secs = idle_timeout.as_secs(),
                    "Completion provider went idle, aborting stream"
                );
                vec![session.fail("completion provider timed out")]
            }
            Ok(Some(Ok(bytes))) => session.on_chunk(&bytes),
            Ok(Some(Err(e))) => {
                tracing::error!(error = %e, "Upstream stream failed mid-relay");
                vec![session.fail(&e.to_string())]
            }
            Ok(None) => session.on_end(),
        };

        for frame in &frames {
            if tx.send(frame.to_sse()).await.is_err() {
                tracing::info!("Caller disconnected, aborting upstream request");
                session.fail("caller disconnected");
                return RelayOutcome {
                    state: session.state(),
                    accumulated_text: session.accumulated_text().to_string(),
                };
            }
        }

        match session.state() {
            SessionState::Streaming => continue,
            _ => break,
        }
    }

    RelayOutcome {
        state: session.state(),
        accumulated_text: session.accumulated_text().to_string(),
    }
}
