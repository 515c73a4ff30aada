//! Streaming relay core.
//!
//! The pipeline for one chat request: the upstream client opens the
//! provider's streaming completion, the line decoder reassembles SSE
//! lines from raw byte chunks, the event parser extracts text deltas,
//! and the session maps events to outbound frames on the caller's
//! connection.

mod decoder;
mod events;
mod session;
mod upstream;

pub use decoder::LineDecoder;
pub use events::{EventParser, StreamEvent};
pub use session::{run_relay, Frame, RelayOutcome, RelaySession, SessionState};
pub use upstream::{ByteChunkSource, UpstreamClient, UpstreamError};
