//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! The payload is a sequence of fields, each `field_len (4 bytes) + bytes`.
//!
//! ### Fields by Command Type
//! - GET, DELETE, EXISTS, HISTORY: key
//! - PUT, UPDATE:                  key, value
//! - RANGE:                        start, end (either may be empty)
//! - INVOKE:                       function, arg, arg, ...
//! - PING:                         none
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use crate::error::{LedgerError, Result};

use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut payload = Vec::new();
    match command {
        Command::Get { key }
        | Command::Delete { key }
        | Command::Exists { key }
        | Command::History { key } => {
            put_field(&mut payload, key);
        }
        Command::Put { key, value } | Command::Update { key, value } => {
            put_field(&mut payload, key);
            put_field(&mut payload, value);
        }
        Command::Range { start, end } => {
            put_field(&mut payload, start);
            put_field(&mut payload, end);
        }
        Command::Invoke { function, args } => {
            put_field(&mut payload, function.as_bytes());
            for arg in args {
                put_field(&mut payload, arg.as_bytes());
            }
        }
        Command::Ping => {}
    }

    frame(command.command_type() as u8, &payload)
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = unframe(bytes, "command")?;

    let cmd_type = CommandType::from_byte(cmd_type).ok_or_else(|| {
        LedgerError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_type))
    })?;

    let mut fields = Fields::new(payload);
    let command = match cmd_type {
        CommandType::Get => Command::Get {
            key: fields.next_field("GET", "key")?,
        },
        CommandType::Put => Command::Put {
            key: fields.next_field("PUT", "key")?,
            value: fields.next_field("PUT", "value")?,
        },
        CommandType::Delete => Command::Delete {
            key: fields.next_field("DELETE", "key")?,
        },
        CommandType::Ping => Command::Ping,
        CommandType::Update => Command::Update {
            key: fields.next_field("UPDATE", "key")?,
            value: fields.next_field("UPDATE", "value")?,
        },
        CommandType::Exists => Command::Exists {
            key: fields.next_field("EXISTS", "key")?,
        },
        CommandType::Range => Command::Range {
            start: fields.next_field("RANGE", "start")?,
            end: fields.next_field("RANGE", "end")?,
        },
        CommandType::History => Command::History {
            key: fields.next_field("HISTORY", "key")?,
        },
        CommandType::Invoke => {
            let function = utf8(fields.next_field("INVOKE", "function")?)?;
            let mut args = Vec::new();
            while !fields.is_empty() {
                args.push(utf8(fields.next_field("INVOKE", "arg")?)?);
            }
            Command::Invoke { function, args }
        }
    };

    if !fields.is_empty() {
        return Err(LedgerError::Protocol(format!(
            "{:?} command: {} unexpected trailing bytes",
            cmd_type,
            fields.remaining()
        )));
    }

    Ok(command)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = unframe(bytes, "response")?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        0x03 => Status::InvalidKey,
        _ => {
            return Err(LedgerError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    decode_command(&read_frame(reader)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    decode_response(&read_frame(reader)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Framing helpers
// =============================================================================

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(tag);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    message
}

/// Split a frame into its tag byte and payload
fn unframe<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(LedgerError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    check_payload_len(payload_len)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(LedgerError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total_len]))
}

/// Read header then payload, returning the whole frame
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    check_payload_len(payload_len)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;
    Ok(message)
}

fn check_payload_len(len: u32) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(LedgerError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn put_field(payload: &mut Vec<u8>, field: &[u8]) {
    payload.extend_from_slice(&(field.len() as u32).to_be_bytes());
    payload.extend_from_slice(field);
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| LedgerError::Protocol(format!("INVOKE command: non-UTF-8 field: {}", e)))
}

/// Cursor over length-prefixed payload fields
struct Fields<'a> {
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { rest: payload }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn remaining(&self) -> usize {
        self.rest.len()
    }

    fn next_field(&mut self, command: &str, name: &str) -> Result<Vec<u8>> {
        if self.rest.len() < 4 {
            return Err(LedgerError::Protocol(format!(
                "{} command: missing {} length",
                command, name
            )));
        }

        let len = u32::from_be_bytes([self.rest[0], self.rest[1], self.rest[2], self.rest[3]])
            as usize;
        if self.rest.len() < 4 + len {
            return Err(LedgerError::Protocol(format!(
                "{} command: incomplete {} (expected {}, got {})",
                command,
                name,
                len,
                self.rest.len() - 4
            )));
        }

        let field = self.rest[4..4 + len].to_vec();
        self.rest = &self.rest[4 + len..];
        Ok(field)
    }
}
