//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;

use super::entry::FrameHeader;
use super::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset just past the last entry read successfully
    position: u64,
    /// Set once an incomplete trailing entry has been seen
    torn: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            torn: false,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at end of file. A header or body cut short by a
    /// crash also ends the log; [`WalReader::has_torn_tail`] reports it.
    /// A complete frame that fails its CRC is a `WalCorruption` error.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        if self.torn {
            return Ok(None);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header_bytes)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            tracing::debug!(
                "Partial header at offset {}: {} of {} bytes",
                self.position,
                read,
                HEADER_SIZE
            );
            self.torn = true;
            return Ok(None);
        }

        let header = FrameHeader::parse(&header_bytes)?;
        let mut data = vec![0u8; header.len as usize];
        let read = read_full(&mut self.reader, &mut data)?;
        if read < data.len() {
            tracing::debug!(
                "Partial entry at offset {}: {} of {} data bytes",
                self.position,
                read,
                data.len()
            );
            self.torn = true;
            return Ok(None);
        }

        let entry = WalEntry::decode_body(&header, &data)?;
        self.position += (HEADER_SIZE + data.len()) as u64;
        Ok(Some(entry))
    }

    /// Whether reading stopped at an incomplete trailing entry
    pub fn has_torn_tail(&self) -> bool {
        self.torn
    }

    /// Byte offset just past the last valid entry
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
///
/// Yields the first error it meets and then stops.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the stream allows, returning the bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
