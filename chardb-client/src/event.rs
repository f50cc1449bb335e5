//! Events delivered by a [`Connection`](crate::Connection).

use chardb_protocol::{CharacterRecord, Reply};
use tokio::sync::mpsc;

/// Failure message for operations issued without a connection.
pub const NOT_CONNECTED: &str = "not connected";

/// Failure message for operations cut short by a disconnect.
pub const DISCONNECTED: &str = "disconnected";

/// Receiving end of a connection's event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Connection lifecycle and operation outcome events.
///
/// Every operation resolves to exactly one of `RecordsReceived`,
/// `RecordReceived`, `OperationSucceeded` or `OperationFailed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// TCP connection established.
    Connected,
    /// The connection could not be established.
    ConnectionFailed(String),
    /// Reply to a get-all request.
    RecordsReceived(Vec<CharacterRecord>),
    /// Reply to a get-one request.
    RecordReceived(CharacterRecord),
    /// Add, update or remove acknowledged.
    OperationSucceeded,
    /// Operation failed; carries a human-readable reason.
    OperationFailed(String),
    /// An established connection ended.
    Disconnected,
    /// The server sent a reply while no request was in flight. The next event
    /// is that reply and resolves no operation.
    Unsolicited,
}

impl ConnectionEvent {
    /// Returns whether this event resolves an operation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionEvent::RecordsReceived(_)
                | ConnectionEvent::RecordReceived(_)
                | ConnectionEvent::OperationSucceeded
                | ConnectionEvent::OperationFailed(_)
        )
    }
}

impl From<Reply> for ConnectionEvent {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Records(records) => ConnectionEvent::RecordsReceived(records),
            Reply::Record(record) => ConnectionEvent::RecordReceived(record),
            Reply::Success => ConnectionEvent::OperationSucceeded,
            Reply::Failure(failure) => ConnectionEvent::OperationFailed(failure.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chardb_protocol::Failure;

    #[test]
    fn test_from_reply() {
        assert_eq!(
            ConnectionEvent::from(Reply::Success),
            ConnectionEvent::OperationSucceeded
        );
        assert_eq!(
            ConnectionEvent::from(Reply::Failure(Failure::ServerError)),
            ConnectionEvent::OperationFailed("server error".to_string())
        );
        assert_eq!(
            ConnectionEvent::from(Reply::Failure(Failure::Processing("bad".to_string()))),
            ConnectionEvent::OperationFailed("processing error: bad".to_string())
        );
        assert_eq!(
            ConnectionEvent::from(Reply::Records(vec![])),
            ConnectionEvent::RecordsReceived(vec![])
        );
    }

    #[test]
    fn test_is_terminal() {
        assert!(ConnectionEvent::OperationSucceeded.is_terminal());
        assert!(ConnectionEvent::OperationFailed("x".to_string()).is_terminal());
        assert!(ConnectionEvent::RecordsReceived(vec![]).is_terminal());
        assert!(!ConnectionEvent::Connected.is_terminal());
        assert!(!ConnectionEvent::Disconnected.is_terminal());
        assert!(!ConnectionEvent::Unsolicited.is_terminal());
        assert!(!ConnectionEvent::ConnectionFailed("x".to_string()).is_terminal());
    }
}
