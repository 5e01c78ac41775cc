//! Newline-delimited JSON framing for the MCP stdio wire.
//!
//! The transport is a byte pipe, not a message pipe: a single `read` may
//! deliver half a line, three lines, or a line plus a fragment of the next.
//! [`LineFramer`] buffers the undecoded tail across feeds so message
//! boundaries survive arbitrary chunking.
//!
//! A line that fails to parse (server log output, invalid UTF-8, truncated
//! JSON) becomes a [`FrameEvent::Malformed`] event; the stream keeps going.

use serde::Serialize;
use serde_json::Value;

use super::errors::McpError;
use super::types::Inbound;

/// Maximum accepted line length. Lines beyond this are discarded up to the
/// next newline to keep a misbehaving server from growing the buffer
/// without bound.
const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// How much of an undecodable line is preserved in the malformed event.
const MALFORMED_RAW_CAP: usize = 512;

// ─── Events ──────────────────────────────────────────────────────────────────

/// One decoded unit out of the framer.
#[derive(Debug)]
pub enum FrameEvent {
    /// A complete, classified protocol message.
    Message(Inbound),
    /// A line that could not be decoded; carries the (capped) raw text.
    Malformed { raw: String, reason: String },
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Serialize a message to its canonical JSON text followed by a newline.
pub fn encode<T: Serialize>(message: &T) -> Result<String, McpError> {
    let mut text = serde_json::to_string(message).map_err(|e| McpError::Protocol {
        reason: format!("failed to serialize message: {e}"),
    })?;
    text.push('\n');
    Ok(text)
}

// ─── LineFramer ──────────────────────────────────────────────────────────────

/// Incremental decoder: bytes in, complete messages out.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
    /// Set after an oversized line: bytes are dropped until the next newline.
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an arbitrary chunk of bytes; returns zero or more events.
    ///
    /// Any trailing partial line is retained for the next call. Event order
    /// matches byte order on the wire.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        let mut events = Vec::new();
        let mut chunk = chunk;

        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return events,
            }
        }

        self.buf.extend_from_slice(chunk);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).take(pos).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }

        if self.buf.len() > MAX_LINE_BYTES {
            events.push(FrameEvent::Malformed {
                raw: cap_raw(&String::from_utf8_lossy(&self.buf)),
                reason: format!("line exceeds {MAX_LINE_BYTES} bytes"),
            });
            self.buf.clear();
            self.discarding = true;
        }

        events
    }

    /// Bytes currently buffered awaiting a newline.
    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Decode one complete line. Returns `None` for blank lines.
fn decode_line(line: &[u8]) -> Option<FrameEvent> {
    let text = match std::str::from_utf8(line) {
        Ok(t) => t,
        Err(e) => {
            return Some(FrameEvent::Malformed {
                raw: cap_raw(&String::from_utf8_lossy(line)),
                reason: format!("invalid UTF-8: {e}"),
            });
        }
    };

    let trimmed = text.trim_end_matches('\r').trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            // Likely server log output written to stdout by mistake.
            return Some(FrameEvent::Malformed {
                raw: cap_raw(trimmed),
                reason: format!("not valid JSON: {e}"),
            });
        }
    };

    match Inbound::classify(value) {
        Ok(msg) => Some(FrameEvent::Message(msg)),
        Err(reason) => Some(FrameEvent::Malformed {
            raw: cap_raw(trimmed),
            reason,
        }),
    }
}

fn cap_raw(raw: &str) -> String {
    if raw.len() <= MALFORMED_RAW_CAP {
        return raw.to_string();
    }
    let mut end = MALFORMED_RAW_CAP;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &raw[..end])
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::Request;

    fn wire(lines: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for line in lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        out
    }

    fn response_ids(events: &[FrameEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                FrameEvent::Message(Inbound::Response { id, .. }) => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_encode_appends_single_newline() {
        let text = encode(&Request::new(1, "tools/list", None)).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
    }

    #[test]
    fn test_whole_buffer_decodes_all_lines() {
        let mut framer = LineFramer::new();
        let bytes = wire(&[
            r#"{"jsonrpc":"2.0","id":1,"result":{}}"#,
            r#"{"jsonrpc":"2.0","id":2,"result":{}}"#,
            r#"{"jsonrpc":"2.0","id":3,"result":{}}"#,
        ]);
        let events = framer.feed(&bytes);
        assert_eq!(response_ids(&events), vec![1, 2, 3]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_chunk_boundaries_do_not_change_output() {
        let bytes = wire(&[
            r#"{"jsonrpc":"2.0","id":1,"result":{"rows":[1,2]}}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{}}"#,
            r#"{"jsonrpc":"2.0","id":2,"result":null,"error":{"code":-32000,"message":"boom"}}"#,
        ]);

        // Reference: everything at once.
        let mut reference = LineFramer::new();
        let all_at_once = reference.feed(&bytes);

        // Byte-by-byte delivery must yield the same sequence.
        let mut framer = LineFramer::new();
        let mut trickled = Vec::new();
        for byte in &bytes {
            trickled.extend(framer.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(trickled.len(), all_at_once.len());
        assert_eq!(response_ids(&trickled), response_ids(&all_at_once));

        // Split mid-line at every position of the first message.
        for split in 1..40 {
            let mut framer = LineFramer::new();
            let mut events = framer.feed(&bytes[..split]);
            events.extend(framer.feed(&bytes[split..]));
            assert_eq!(events.len(), all_at_once.len(), "split at {split}");
            assert_eq!(response_ids(&events), response_ids(&all_at_once));
        }
    }

    #[test]
    fn test_partial_line_retained_across_feeds() {
        let mut framer = LineFramer::new();
        let events = framer.feed(br#"{"jsonrpc":"2.0","id":9,"#);
        assert!(events.is_empty());
        assert!(framer.buffered() > 0);

        let events = framer.feed(b"\"result\":{}}\n");
        assert_eq!(response_ids(&events), vec![9]);
    }

    #[test]
    fn test_malformed_line_does_not_stop_the_stream() {
        let mut framer = LineFramer::new();
        let bytes = wire(&[
            "Server listening on port 1433",
            r#"{"jsonrpc":"2.0","id":1,"result":{}}"#,
        ]);
        let events = framer.feed(&bytes);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            FrameEvent::Malformed { ref raw, .. } if raw.contains("listening")
        ));
        assert_eq!(response_ids(&events), vec![1]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut framer = LineFramer::new();
        let events = framer.feed(b"\n\r\n   \n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_crlf_line_endings_accepted() {
        let mut framer = LineFramer::new();
        let events = framer.feed(b"{\"jsonrpc\":\"2.0\",\"id\":5,\"result\":{}}\r\n");
        assert_eq!(response_ids(&events), vec![5]);
    }

    #[test]
    fn test_oversized_line_discarded_stream_continues() {
        let mut framer = LineFramer::new();
        let big = vec![b'x'; MAX_LINE_BYTES + 1];
        let events = framer.feed(&big);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], FrameEvent::Malformed { .. }));

        // Remainder of the oversized line is dropped up to the newline;
        // the next line decodes normally.
        let mut tail = b"xxxx\n".to_vec();
        tail.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":6,\"result\":{}}\n");
        let events = framer.feed(&tail);
        assert_eq!(response_ids(&events), vec![6]);
    }

    #[test]
    fn test_shapeless_json_reported_malformed() {
        let mut framer = LineFramer::new();
        let events = framer.feed(b"{\"jsonrpc\":\"2.0\"}\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], FrameEvent::Malformed { .. }));
    }
}
