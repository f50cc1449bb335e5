//! Command and response codes.
//!
//! The first byte of every message body identifies it. Client requests carry a
//! [`Command`] byte; server replies carry either a command byte echoed back or
//! one of the generic response codes.

use std::fmt;

/// Generic success response code.
pub const RESP_SUCCESS: u8 = 0x80;

/// Generic error response code. Carries no payload.
pub const RESP_ERROR: u8 = 0x81;

/// Client command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    GetAll = 0x01,
    Add = 0x02,
    Remove = 0x03,
    GetOne = 0x04,
    Update = 0x05,
}

impl Command {
    /// Returns the wire byte for this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parses a command byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Command::GetAll),
            0x02 => Some(Command::Add),
            0x03 => Some(Command::Remove),
            0x04 => Some(Command::GetOne),
            0x05 => Some(Command::Update),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::GetAll => write!(f, "GET_ALL"),
            Command::Add => write!(f, "ADD"),
            Command::Remove => write!(f, "REMOVE"),
            Command::GetOne => write!(f, "GET_ONE"),
            Command::Update => write!(f, "UPDATE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::GetAll.code(), 0x01);
        assert_eq!(Command::Add.code(), 0x02);
        assert_eq!(Command::Remove.code(), 0x03);
        assert_eq!(Command::GetOne.code(), 0x04);
        assert_eq!(Command::Update.code(), 0x05);
    }

    #[test]
    fn test_command_from_code() {
        for cmd in [
            Command::GetAll,
            Command::Add,
            Command::Remove,
            Command::GetOne,
            Command::Update,
        ] {
            assert_eq!(Command::from_code(cmd.code()), Some(cmd));
        }
        assert_eq!(Command::from_code(0x00), None);
        assert_eq!(Command::from_code(RESP_SUCCESS), None);
        assert_eq!(Command::from_code(RESP_ERROR), None);
    }

    #[test]
    fn test_command_display() {
        assert_eq!(format!("{}", Command::GetAll), "GET_ALL");
        assert_eq!(format!("{}", Command::Update), "UPDATE");
    }
}
