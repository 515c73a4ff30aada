//! SSE line reassembly.
//!
//! Provides [`LineDecoder`] for turning raw byte chunks (arbitrary,
//! network-determined boundaries) into complete SSE lines. Handles TCP
//! chunk boundary reassembly correctly: a line or a multi-byte UTF-8
//! character split across two chunks is buffered, never corrupted.

/// Tail buffer cap. A well-behaved provider emits a line break well before
/// this; past it the buffer is drained to bound memory on a broken stream.
const MAX_BUFFER_BYTES: usize = 64 * 1024;

/// Stateful line decoder with a persistent cross-chunk tail buffer.
///
/// Buffering is byte-level: since `\n` (0x0A) can never appear inside a
/// multi-byte UTF-8 sequence, holding undelimited bytes until the next
/// line break also holds any partially received character intact.
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed one chunk of bytes, returning every line completed by it.
    ///
    /// Lines are yielded in arrival order with the trailing `\n` (and any
    /// preceding `\r`) stripped. Bytes after the last line break are
    /// retained as the new tail.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        for i in 0..self.buffer.len() {
            if self.buffer[i] == b'\n' {
                lines.push(decode_line(&self.buffer[start..i]));
                start = i + 1;
            }
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_BUFFER_BYTES {
            tracing::warn!(
                buffered = self.buffer.len(),
                "line buffer exceeded cap without a line break, draining"
            );
            self.buffer.clear();
        }

        lines
    }

    /// Signal end-of-input, yielding the remaining tail as a final line.
    ///
    /// The provider may omit the terminator on its last frame; a non-empty
    /// tail is still a complete line at that point. An empty tail yields
    /// nothing.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(decode_line(&self.buffer))
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one delimited line, stripping a trailing `\r` (CRLF streams).
fn decode_line(bytes: &[u8]) -> String {
    let bytes = if bytes.ends_with(b"\r") {
        &bytes[..bytes.len() - 1]
    } else {
        bytes
    };
    String::from_utf8_lossy(bytes).into_owned()
}
