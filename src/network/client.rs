//! Blocking client
//!
//! One request, one response, over a single TCP connection.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{LedgerError, Result};
use crate::protocol::{read_response, write_command, Command, Response};

/// Client for a LedgerKV server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| LedgerError::Network(format!("connect: {}", e)))?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Bound how long a response may take to arrive
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send a command and wait for its response
    pub fn request(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)
    }

    /// Run a named contract transaction
    pub fn invoke(&mut self, function: &str, args: &[&str]) -> Result<Response> {
        self.request(&Command::Invoke {
            function: function.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    pub fn ping(&mut self) -> Result<Response> {
        self.request(&Command::Ping)
    }
}
