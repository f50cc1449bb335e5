//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or record coding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed record: {field}: {detail}")]
    MalformedRecord { field: &'static str, detail: String },

    #[error("trailing partial record at offset {offset} of {len} bytes")]
    TrailingBytes { offset: usize, len: usize },

    #[error("field {field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("message body contains the frame delimiter at offset {offset}")]
    DelimiterInBody { offset: usize },

    #[error("frame too large: {size} bytes buffered without a delimiter (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

impl ProtocolError {
    pub(crate) fn short(field: &'static str, needed: usize, available: usize) -> Self {
        ProtocolError::MalformedRecord {
            field,
            detail: format!("need {} bytes, {} available", needed, available),
        }
    }
}
