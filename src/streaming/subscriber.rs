//! Blocking client for the event bus

use std::io::{self, BufRead, BufReader, Read};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use log::debug;

use super::protocol::{Event, MAX_LINE_LEN};
use crate::error::{Error, Result};

/// Longest line accepted, terminator included
const READ_LIMIT: usize = MAX_LINE_LEN + 2;

/// Line reader over an event bus connection
pub struct EventSubscriber {
    reader: BufReader<UnixStream>,
    line: Vec<u8>,
}

impl EventSubscriber {
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| {
            Error::Other(format!("cannot connect to {}: {}", path.display(), e))
        })?;
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            reader: BufReader::new(stream),
            line: Vec::with_capacity(READ_LIMIT),
        }
    }

    /// `None` blocks indefinitely
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Next well-formed event, or `None` once the bus closes the connection.
    ///
    /// Lines that are too long, not UTF-8, or not a valid event are skipped.
    /// A read timeout surfaces as `Error::Io` with kind `WouldBlock` or
    /// `TimedOut`.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            self.line.clear();
            let n = (&mut self.reader)
                .take(READ_LIMIT as u64)
                .read_until(b'\n', &mut self.line)?;
            if n == 0 {
                return Ok(None);
            }

            if n == READ_LIMIT && self.line.last() != Some(&b'\n') {
                self.discard_line()?;
                debug!("Skipping event line over {} bytes", MAX_LINE_LEN);
                continue;
            }

            let text = match std::str::from_utf8(&self.line) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping non-UTF-8 event line: {}", e);
                    continue;
                }
            };

            match Event::parse(text) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => debug!("Skipping event line: {}", e),
            }
        }
    }

    /// Consume the rest of the current line without buffering it
    fn discard_line(&mut self) -> Result<()> {
        loop {
            let (used, done) = {
                let buf = match self.reader.fill_buf() {
                    Ok(buf) => buf,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                if buf.is_empty() {
                    return Ok(());
                }
                match buf.iter().position(|&b| b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (buf.len(), false),
                }
            };
            self.reader.consume(used);
            if done {
                return Ok(());
            }
        }
    }
}

impl Iterator for EventSubscriber {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
