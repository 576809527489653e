use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{debug, trace};

use super::Shared;
use crate::{Result, StreamError};

/// The producing end of a fan-out buffer.
///
/// Dropping the writer closes it; see [`FanOutWriter::close`].
pub struct FanOutWriter {
    shared:        Arc<Shared>,
    write_pos:     usize,
    bytes_written: u64,
    eof:           bool,
    closed:        bool,
}

impl FanOutWriter {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            write_pos: 0,
            bytes_written: 0,
            eof: false,
            closed: false,
        }
    }

    pub(crate) fn closed(shared: Arc<Shared>) -> Self {
        let mut writer = Self::new(shared);
        writer.closed = true;
        writer
    }

    pub fn capacity(&self) -> usize { self.shared.capacity }

    pub fn bytes_written(&self) -> u64 { self.bytes_written }

    /// Readers that have not closed yet.
    pub fn open_readers(&self) -> usize { self.shared.open_readers.load(Ordering::Acquire) }

    /// Publishes `chunk` to every open reader.
    ///
    /// Blocks until each open reader has room for the whole chunk, so a chunk
    /// may not exceed the buffer capacity. Fails with
    /// [`StreamError::BrokenStream`] once no reader is left to receive it.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if self.closed {
            return Err(StreamError::BrokenStream("writer closed"));
        }
        if self.eof {
            return Err(StreamError::invalid("write after end of stream"));
        }
        let capacity = self.shared.capacity;
        let len = chunk.len();
        if len > capacity {
            return Err(StreamError::invalid(format!(
                "chunk of {len} bytes exceeds buffer capacity {capacity}"
            )));
        }
        if len == 0 {
            return Ok(());
        }

        // Only the producer shrinks a gate's write side, so a gate that has
        // room stays roomy while we wait on the others.
        let open = self
            .shared
            .gates()
            .iter()
            .filter(|gate| gate.await_write_capacity(len))
            .count();
        if open == 0 {
            return Err(StreamError::BrokenStream("no reader remains"));
        }

        {
            let mut guard = self.shared.buffer.write();
            let buffer = guard
                .as_mut()
                .ok_or(StreamError::BrokenStream("no reader remains"))?;
            let head = len.min(capacity - self.write_pos);
            buffer[self.write_pos..self.write_pos + head].copy_from_slice(&chunk[..head]);
            buffer[..len - head].copy_from_slice(&chunk[head..]);
        }

        let delivered = self
            .shared
            .gates()
            .iter()
            .filter(|gate| gate.publish(len))
            .count();
        if delivered == 0 {
            return Err(StreamError::BrokenStream("no reader remains"));
        }
        self.write_pos = (self.write_pos + len) % capacity;
        self.bytes_written += len as u64;
        trace!(len, readers = delivered, total = self.bytes_written, "chunk published");
        Ok(())
    }

    /// Marks a clean end of stream. Readers report EOF once they have drained
    /// every published byte.
    pub fn write_eof(&mut self) -> Result<()> {
        if self.closed {
            return Err(StreamError::BrokenStream("writer closed"));
        }
        if !self.eof {
            self.eof = true;
            self.shared.signal_eof();
            debug!(total = self.bytes_written, "end of stream published");
        }
        Ok(())
    }

    /// Releases the writer. Idempotent.
    ///
    /// Without a prior [`write_eof`](Self::write_eof) every gate is closed and
    /// readers fail with a broken-stream error after draining, rather than
    /// taking the truncated stream for a complete one.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if !self.eof {
            for gate in self.shared.gates() {
                gate.close();
            }
            debug!(total = self.bytes_written, "writer closed without end of stream");
        }
    }
}

impl io::Write for FanOutWriter {
    /// Writes at most one buffer capacity of `buf`.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(self.shared.capacity);
        self.write_chunk(&buf[..len])?;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Drop for FanOutWriter {
    fn drop(&mut self) { self.close(); }
}
