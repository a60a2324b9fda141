//! Response definitions
//!
//! Represents responses to clients.

use crate::error::LedgerError;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    InvalidKey = 0x03,
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (value or JSON for OK, message otherwise)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create a NOT_FOUND response carrying the message
    pub fn not_found(message: &str) -> Self {
        Self {
            status: Status::NotFound,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Create an INVALID_KEY response
    pub fn invalid_key(message: &str) -> Self {
        Self {
            status: Status::InvalidKey,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Payload as (lossy) UTF-8 text, empty when absent
    pub fn text(&self) -> String {
        self.payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default()
    }
}

impl From<LedgerError> for Response {
    fn from(error: LedgerError) -> Self {
        let message = error.to_string();
        match error {
            LedgerError::NotFound(_) => Response::not_found(&message),
            LedgerError::InvalidKey(_) => Response::invalid_key(&message),
            _ => Response::error(&message),
        }
    }
}
