//! SSE line framing
//!
//! Splits decoded text into newline-delimited `data: ` records. A partial
//! trailing line is retained and completed by the next fragment.

use super::decoder::Utf8Decoder;
use tracing::trace;

/// Prefix marking an SSE data record
const DATA_PREFIX: &str = "data: ";

/// Buffers text and yields the payload of every complete `data: ` line.
#[derive(Debug, Default)]
pub(crate) struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append decoded text and return payloads of the lines it completed.
    pub(crate) fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);
        complete.split('\n').filter_map(data_payload).collect()
    }

    /// End of stream: the retained partial line, if it is a data record.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

/// Payload of a single line, or `None` for blank and non-data lines.
fn data_payload(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.strip_prefix(DATA_PREFIX) {
        Some(payload) => Some(payload.to_string()),
        None => {
            trace!(line = %trimmed, "Ignoring non-data SSE line");
            None
        }
    }
}

/// Bytes in, record payloads out.
///
/// One instance per logical stream; a new session always builds a fresh
/// reader so no buffered bytes or text carry over.
#[derive(Debug)]
pub(crate) struct EventReader {
    decoder: Utf8Decoder,
    framer: LineFramer,
}

impl EventReader {
    pub(crate) fn new() -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            framer: LineFramer::new(),
        }
    }

    /// Feed one network chunk
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(bytes);
        if text.is_empty() {
            return Vec::new();
        }
        self.framer.push(&text)
    }

    /// Flush decoder and framer when the byte stream ends
    pub(crate) fn finish(&mut self) -> Vec<String> {
        let tail = self.decoder.finish();
        let mut payloads = if tail.is_empty() {
            Vec::new()
        } else {
            self.framer.push(&tail)
        };
        payloads.extend(self.framer.finish());
        payloads
    }
}
