use std::io;
use std::sync::Arc;

use tracing::{debug, trace};

use super::Shared;
use super::gate::Readable;
use crate::{Result, StreamError};

/// One consuming end of a fan-out buffer. Sees every byte the writer
/// publishes, in order.
///
/// Dropping the reader closes it; see [`FanOutReader::close`].
pub struct FanOutReader {
    shared:     Arc<Shared>,
    rank:       usize,
    read_pos:   usize,
    bytes_read: u64,
    closed:     bool,
}

impl FanOutReader {
    pub(crate) fn new(shared: Arc<Shared>, rank: usize) -> Self {
        Self {
            shared,
            rank,
            read_pos: 0,
            bytes_read: 0,
            closed: false,
        }
    }

    pub fn rank(&self) -> usize { self.rank }

    pub fn bytes_read(&self) -> u64 { self.bytes_read }

    /// Bytes buffered for this reader that a read returns without blocking.
    pub fn available(&self) -> usize {
        if self.closed {
            return 0;
        }
        self.shared.gate(self.rank).read_capacity()
    }

    /// Reads up to `buf.len()` bytes, blocking until at least one is
    /// buffered. Returns `Ok(0)` at a clean end of stream, and
    /// [`StreamError::BrokenStream`] once drained if the writer closed without
    /// one.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.closed {
            return Err(StreamError::BrokenStream("reader closed"));
        }
        let gate = self.shared.gate(self.rank);
        let available = match gate.await_readable(&self.shared.eof) {
            Readable::Bytes(n) => n,
            Readable::Eof => return Ok(0),
            Readable::Broken => {
                return Err(StreamError::BrokenStream("writer closed without end of stream"));
            }
        };

        let capacity = self.shared.capacity;
        let len = available.min(buf.len());
        {
            let guard = self.shared.buffer.read();
            let buffer = guard
                .as_ref()
                .ok_or(StreamError::BrokenStream("buffer released"))?;
            let head = len.min(capacity - self.read_pos);
            buf[..head].copy_from_slice(&buffer[self.read_pos..self.read_pos + head]);
            buf[head..len].copy_from_slice(&buffer[..len - head]);
        }
        gate.consume(len);

        self.read_pos = (self.read_pos + len) % capacity;
        self.bytes_read += len as u64;
        trace!(rank = self.rank, len, total = self.bytes_read, "chunk consumed");
        Ok(len)
    }

    /// Releases the reader. Idempotent.
    ///
    /// The reader's gate stops constraining the writer. When the last reader
    /// closes, the circular buffer goes back to its pool.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.gate(self.rank).close();
        debug!(rank = self.rank, bytes_read = self.bytes_read, "reader closed");
        self.shared.reader_closed();
    }
}

impl io::Read for FanOutReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { Ok(self.read_chunk(buf)?) }
}

impl Drop for FanOutReader {
    fn drop(&mut self) { self.close(); }
}
