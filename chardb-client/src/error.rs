//! Client error types.

use crate::event::{DISCONNECTED, NOT_CONNECTED};
use chardb_protocol::Failure;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] chardb_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("unexpected event: {0}")]
    UnexpectedEvent(String),
}

impl ClientError {
    /// Maps an `OperationFailed` event message to an error.
    pub fn from_failure_message(message: String) -> Self {
        match message.as_str() {
            NOT_CONNECTED => ClientError::NotConnected,
            DISCONNECTED => ClientError::ConnectionClosed,
            _ => ClientError::OperationFailed(message),
        }
    }

    /// Returns whether the server answered a list request with no records.
    pub fn is_empty_result_set(&self) -> bool {
        matches!(self, ClientError::OperationFailed(m) if *m == Failure::EmptyResultSet.to_string())
    }

    /// Returns whether the connection is gone and must be re-established.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected
                | ClientError::ConnectionClosed
                | ClientError::ConnectionFailed(_)
        )
    }
}
