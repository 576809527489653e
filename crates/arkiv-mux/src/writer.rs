use std::io::{Read, Write};

use arkiv_stream::{DEFAULT_COPY_BUFFER_SIZE, ExactSizeReader, StreamError, copy_with_buffer};
use tracing::{debug, warn};

use crate::{END_OF_STREAM, HEADER_LEN, MuxError, Result};

/// Serialized length of a multiplexed stream holding entries of `sizes`,
/// terminator included. `None` if a size does not fit the signed header or
/// the total overflows.
pub fn multiplexed_size(sizes: &[u64]) -> Option<u64> {
    sizes.iter().try_fold(HEADER_LEN, |total, &size| {
        i64::try_from(size).ok()?;
        total.checked_add(HEADER_LEN)?.checked_add(size)
    })
}

/// Packs several sized byte streams into one transport stream.
///
/// Each entry is an 8-byte big-endian size followed by exactly that many
/// payload bytes; [`append_end_of_file`](Self::append_end_of_file) writes the
/// `-1` terminator. A failed entry leaves the stream unusable and later calls
/// fail with [`MuxError::Aborted`].
pub struct MultiplexWriter<W: Write> {
    inner:         W,
    buffer_size:   usize,
    entries:       usize,
    bytes_written: u64,
    finished:      bool,
    aborted:       bool,
}

impl<W: Write> MultiplexWriter<W> {
    pub fn new(inner: W) -> Self { Self::with_buffer_size(inner, DEFAULT_COPY_BUFFER_SIZE) }

    /// Copies payloads through a buffer of `buffer_size` bytes.
    pub fn with_buffer_size(inner: W, buffer_size: usize) -> Self {
        Self {
            inner,
            buffer_size,
            entries: 0,
            bytes_written: 0,
            finished: false,
            aborted: false,
        }
    }

    /// Appends one entry whose payload is exactly `size` bytes read from
    /// `source`. A source holding more or fewer bytes fails the entry.
    pub fn append_entry<R: Read>(&mut self, size: u64, source: R) -> Result<u64> {
        self.check_writable()?;
        let declared = i64::try_from(size).map_err(|_| {
            StreamError::InvalidArgument(format!("entry size {size} exceeds the wire format"))
        })?;

        let result = self.write_entry(declared, size, source);
        match &result {
            Ok(_) => {
                self.entries += 1;
                debug!(entry = self.entries, size, "multiplexed entry appended");
            }
            Err(e) => {
                self.aborted = true;
                warn!(entry = self.entries + 1, size, error = %e, "multiplexed entry failed");
            }
        }
        result
    }

    fn write_entry<R: Read>(&mut self, declared: i64, size: u64, source: R) -> Result<u64> {
        let mut guarded = ExactSizeReader::new(source, size)?;
        self.inner.write_all(&declared.to_be_bytes())?;
        self.bytes_written += HEADER_LEN;
        let copied = copy_with_buffer(&mut guarded, &mut self.inner, self.buffer_size)?;
        self.bytes_written += copied;
        Ok(copied)
    }

    /// Writes the terminator and flushes the underlying writer.
    pub fn append_end_of_file(&mut self) -> Result<()> {
        self.check_writable()?;
        self.inner.write_all(&END_OF_STREAM.to_be_bytes())?;
        self.inner.flush()?;
        self.bytes_written += HEADER_LEN;
        self.finished = true;
        debug!(entries = self.entries, total = self.bytes_written, "multiplexed stream terminated");
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.aborted {
            return Err(MuxError::Aborted);
        }
        if self.finished {
            return Err(MuxError::Finished);
        }
        Ok(())
    }

    pub fn entries(&self) -> usize { self.entries }

    pub fn bytes_written(&self) -> u64 { self.bytes_written }

    pub fn is_finished(&self) -> bool { self.finished }

    pub fn get_ref(&self) -> &W { &self.inner }

    pub fn into_inner(self) -> W { self.inner }
}
