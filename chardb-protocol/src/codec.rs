//! Request encoding and response classification.

use crate::command::{Command, RESP_ERROR, RESP_SUCCESS};
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::record::{decode_list, CharacterRecord, Layout};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetAll,
    GetOne(i32),
    Add(CharacterRecord),
    Update(CharacterRecord),
    Remove(i32),
}

impl Request {
    /// Returns the command byte for this request.
    pub fn command(&self) -> Command {
        match self {
            Request::GetAll => Command::GetAll,
            Request::GetOne(_) => Command::GetOne,
            Request::Add(_) => Command::Add,
            Request::Update(_) => Command::Update,
            Request::Remove(_) => Command::Remove,
        }
    }

    /// Encodes the message body: command byte followed by payload.
    pub fn encode_body(&self, layout: Layout) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(self.command().code());
        match self {
            Request::GetAll => {}
            Request::GetOne(id) | Request::Remove(id) => buf.put_i32_le(*id),
            Request::Add(record) | Request::Update(record) => record.encode_into(&mut buf, layout)?,
        }
        Ok(buf)
    }

    /// Encodes the request as a complete delimited frame.
    pub fn encode(&self, layout: Layout) -> Result<BytesMut, ProtocolError> {
        Frame::encode(&self.encode_body(layout)?)
    }
}

/// Reason a reply counts as a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Frame with no body at all.
    EmptyResponse,
    /// Explicit `RESP_ERROR`; the protocol carries no detail.
    ServerError,
    /// `GET_ALL` reply with an empty payload.
    EmptyResultSet,
    /// Response code outside the known set.
    UnknownResponse(u8),
    /// Payload could not be decoded.
    Processing(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::EmptyResponse => write!(f, "empty response"),
            Failure::ServerError => write!(f, "server error"),
            Failure::EmptyResultSet => write!(f, "empty result set"),
            Failure::UnknownResponse(_) => write!(f, "unknown response type"),
            Failure::Processing(detail) => write!(f, "processing error: {}", detail),
        }
    }
}

/// Outcome of a server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Records(Vec<CharacterRecord>),
    Record(CharacterRecord),
    Success,
    Failure(Failure),
}

impl Reply {
    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Failure(_))
    }
}

/// Classifies a received message body by its first byte.
///
/// Never fails: decode errors become [`Failure::Processing`].
pub fn classify(body: &[u8], layout: Layout) -> Reply {
    let Some((&code, payload)) = body.split_first() else {
        return Reply::Failure(Failure::EmptyResponse);
    };

    match classify_code(code, payload, layout) {
        Ok(reply) => reply,
        Err(e) => Reply::Failure(Failure::Processing(e.to_string())),
    }
}

fn classify_code(code: u8, payload: &[u8], layout: Layout) -> Result<Reply, ProtocolError> {
    if code == RESP_ERROR {
        return Ok(Reply::Failure(Failure::ServerError));
    }
    if code == RESP_SUCCESS {
        return Ok(Reply::Success);
    }

    let reply = match Command::from_code(code) {
        Some(Command::GetAll) if payload.is_empty() => Reply::Failure(Failure::EmptyResultSet),
        Some(Command::GetAll) => Reply::Records(decode_list(payload, layout)?),
        Some(Command::GetOne) => Reply::Record(CharacterRecord::decode(payload, layout)?),
        Some(Command::Add | Command::Update | Command::Remove) => Reply::Success,
        None => Reply::Failure(Failure::UnknownResponse(code)),
    };
    Ok(reply)
}
