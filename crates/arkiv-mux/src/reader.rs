use std::io::{self, Read};

use arkiv_stream::StreamError;
use tracing::{debug, trace};

use crate::{END_OF_STREAM, MuxError, Result};

/// Splits a multiplexed stream back into its entries, in order.
///
/// ```
/// use std::io::Read;
/// use arkiv_mux::{MultiplexReader, MultiplexWriter};
///
/// let mut writer = MultiplexWriter::new(Vec::new());
/// writer.append_entry(5, &b"hello"[..]).unwrap();
/// writer.append_end_of_file().unwrap();
///
/// let bytes = writer.into_inner();
/// let mut reader = MultiplexReader::new(&bytes[..]);
/// let mut entry = reader.next_entry().unwrap().unwrap();
/// assert_eq!(entry.size(), 5);
/// let mut payload = String::new();
/// entry.read_to_string(&mut payload).unwrap();
/// assert_eq!(payload, "hello");
/// assert!(reader.next_entry().unwrap().is_none());
/// ```
pub struct MultiplexReader<R> {
    source:    R,
    current:   u64,
    remaining: u64,
    entries:   usize,
    finished:  bool,
}

impl<R: Read> MultiplexReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            current: 0,
            remaining: 0,
            entries: 0,
            finished: false,
        }
    }

    /// Advances to the next entry, skipping whatever the previous one left
    /// unread. Returns `None` once the terminator has been read.
    pub fn next_entry(&mut self) -> Result<Option<Entry<'_, R>>> {
        if self.finished {
            return Ok(None);
        }
        self.skip_remaining()?;

        let mut header = [0u8; 8];
        self.source.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => MuxError::MissingTerminator,
            _ => MuxError::unwrap_io(e),
        })?;
        let size = i64::from_be_bytes(header);
        if size == END_OF_STREAM {
            self.finished = true;
            debug!(entries = self.entries, "multiplexed stream terminator reached");
            return Ok(None);
        }
        let size = u64::try_from(size).map_err(|_| MuxError::InvalidSize(size))?;

        self.entries += 1;
        self.current = size;
        self.remaining = size;
        trace!(entry = self.entries, size, "multiplexed entry header");
        Ok(Some(Entry { reader: self }))
    }

    /// Reads every remaining entry into memory.
    pub fn read_entries(mut self) -> Result<Vec<Vec<u8>>> {
        let mut payloads = Vec::new();
        while let Some(mut entry) = self.next_entry()? {
            let mut payload = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            entry.read_to_end(&mut payload)?;
            payloads.push(payload);
        }
        Ok(payloads)
    }

    /// Entries started so far.
    pub fn entries(&self) -> usize { self.entries }

    pub fn is_finished(&self) -> bool { self.finished }

    pub fn into_inner(self) -> R { self.source }

    fn skip_remaining(&mut self) -> Result<()> {
        let mut scratch = [0u8; 8192];
        while self.remaining > 0 {
            let cap = scratch.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
            self.read_payload(&mut scratch[..cap])?;
        }
        Ok(())
    }

    fn read_payload(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.remaining == 0 {
            return Ok(0);
        }
        let cap = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = loop {
            match self.source.read(&mut buf[..cap]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other?,
            }
        };
        if n == 0 {
            return Err(StreamError::PrematureEof {
                expected: self.current,
                actual:   self.current - self.remaining,
            }
            .into());
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// The payload of one multiplexed entry, readable up to its declared size.
pub struct Entry<'a, R> {
    reader: &'a mut MultiplexReader<R>,
}

impl<R: Read> Entry<'_, R> {
    pub fn size(&self) -> u64 { self.reader.current }

    /// Payload bytes not read yet.
    pub fn remaining(&self) -> u64 { self.reader.remaining }
}

impl<R: Read> Read for Entry<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.reader.read_payload(buf) }
}
