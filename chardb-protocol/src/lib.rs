//! # chardb-protocol
//!
//! Wire protocol implementation for chardb.
//!
//! This crate provides:
//! - CRLF-delimited message framing with partial and coalesced read handling
//! - Binary codec for character records and record lists
//! - Command and response codes
//! - Request encoding and response classification

pub mod codec;
pub mod command;
pub mod error;
pub mod frame;
pub mod record;

pub use codec::{classify, Failure, Reply, Request};
pub use command::{Command, RESP_ERROR, RESP_SUCCESS};
pub use error::ProtocolError;
pub use frame::{Frame, FrameReader, DELIMITER};
pub use record::{CharacterRecord, Layout, DEFAULT_BIO};

/// Default port for the chardb server.
pub const DEFAULT_PORT: u16 = 12345;

/// Maximum number of bytes the frame reader buffers without a delimiter (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
