//! CRLF-delimited message framing.
//!
//! Every message, in both directions, is a body followed by `\r\n`:
//!
//! ```text
//! +------------------------------+------+------+
//! | body (command/response code  | 0x0D | 0x0A |
//! | followed by payload)         |      |      |
//! +------------------------------+------+------+
//! ```
//!
//! Bodies are positional (length-prefixed fields), never delimiter-scanned, so
//! the delimiter must not occur inside one.

use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Message delimiter: CR LF.
pub const DELIMITER: [u8; 2] = *b"\r\n";

/// Frame writer.
pub struct Frame;

impl Frame {
    /// Appends the delimiter to `body`.
    ///
    /// Fails if `body` already contains the delimiter, since the peer would
    /// split it into two messages.
    pub fn encode(body: &[u8]) -> Result<BytesMut, ProtocolError> {
        if let Some(offset) = find_delimiter(body) {
            return Err(ProtocolError::DelimiterInBody { offset });
        }
        let mut buf = BytesMut::with_capacity(body.len() + DELIMITER.len());
        buf.put_slice(body);
        buf.put_slice(&DELIMITER);
        Ok(buf)
    }
}

/// Reassembles delimiter-terminated messages from a byte stream.
///
/// Handles both fragmentation (one message over several reads) and coalescing
/// (several messages in one read).
#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    max_frame_size: usize,
    /// Bytes at the front of `buffer` already known to hold no delimiter.
    scanned: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Creates a reader that rejects more than `max_frame_size` buffered bytes
    /// without a delimiter.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_frame_size,
            scanned: 0,
        }
    }

    /// Appends `data` and drains every complete message now in the buffer, in
    /// arrival order. Empty messages are passed through.
    ///
    /// Fails with [`ProtocolError::FrameTooLarge`] when the unterminated tail
    /// exceeds the limit. If complete messages were extracted in the same call
    /// they are returned first and the failure is reported by the next call
    /// (or by [`ensure_within_limit`](Self::ensure_within_limit)).
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Bytes>, ProtocolError> {
        self.ensure_within_limit()?;
        self.extend(data);

        let mut messages = Vec::new();
        while let Some(message) = self.next_frame() {
            messages.push(message);
        }

        if messages.is_empty() {
            self.ensure_within_limit()?;
        }
        Ok(messages)
    }

    /// Fails if the bytes left after extraction exceed the frame size limit.
    pub fn ensure_within_limit(&self) -> Result<(), ProtocolError> {
        if self.buffer.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: self.buffer.len(),
                max: self.max_frame_size,
            });
        }
        Ok(())
    }

    /// Appends data to the internal buffer without extracting messages.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Removes and returns the next complete message, if any.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        // Back up one byte in case a CR at the end was scanned without its LF.
        let start = self.scanned.saturating_sub(DELIMITER.len() - 1);
        let Some(offset) = find_delimiter(&self.buffer[start..]) else {
            self.scanned = self.buffer.len();
            return None;
        };

        let message = self.buffer.split_to(start + offset).freeze();
        self.buffer.advance(DELIMITER.len());
        self.scanned = 0;
        Some(message)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

fn find_delimiter(data: &[u8]) -> Option<usize> {
    data.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}
