//! Command definitions
//!
//! Represents commands from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Delete = 0x03,
    Ping = 0x04,
    Update = 0x05,
    Exists = 0x06,
    Range = 0x07,
    History = 0x08,
    Invoke = 0x09,
}

impl CommandType {
    /// Map a wire byte back to a command type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Get),
            0x02 => Some(CommandType::Put),
            0x03 => Some(CommandType::Delete),
            0x04 => Some(CommandType::Ping),
            0x05 => Some(CommandType::Update),
            0x06 => Some(CommandType::Exists),
            0x07 => Some(CommandType::Range),
            0x08 => Some(CommandType::History),
            0x09 => Some(CommandType::Invoke),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: Vec<u8> },

    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Ping (health check)
    Ping,

    /// Overwrite a key that must already exist
    Update { key: Vec<u8>, value: Vec<u8> },

    /// Check whether a key is live
    Exists { key: Vec<u8> },

    /// Scan live keys in `[start, end)`; empty bounds are open
    Range { start: Vec<u8>, end: Vec<u8> },

    /// Full write history of a key
    History { key: Vec<u8> },

    /// Run a named contract transaction
    Invoke { function: String, args: Vec<String> },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Delete { .. } => CommandType::Delete,
            Command::Ping => CommandType::Ping,
            Command::Update { .. } => CommandType::Update,
            Command::Exists { .. } => CommandType::Exists,
            Command::Range { .. } => CommandType::Range,
            Command::History { .. } => CommandType::History,
            Command::Invoke { .. } => CommandType::Invoke,
        }
    }
}
