use std::io::{self, Chain, Cursor, Read};

use arkiv_stream::{ExactSizeReader, StreamError};
use tracing::debug;

use crate::{HEADER_LEN, MuxError, Result};

type Framed<E, S> = Chain<Chain<Cursor<[u8; 8]>, ExactSizeReader<E>>, ExactSizeReader<S>>;

/// An existing multiplexed stream with one more entry placed in front of it.
///
/// Reads as the new entry's size prefix, then its payload, then the existing
/// stream verbatim. Both the new payload and the existing stream must hold
/// exactly their declared sizes.
pub struct PrependedMultiplexReader<E, S> {
    inner: Framed<E, S>,
    size:  u64,
}

impl<E: Read, S: Read> PrependedMultiplexReader<E, S> {
    /// `existing_size` is the full serialized length of `existing`,
    /// terminator included.
    pub fn new(entry: E, entry_size: u64, existing: S, existing_size: u64) -> Result<Self> {
        let declared = i64::try_from(entry_size).map_err(|_| {
            StreamError::InvalidArgument(format!("entry size {entry_size} exceeds the wire format"))
        })?;
        if existing_size < HEADER_LEN {
            return Err(MuxError::Stream(StreamError::InvalidArgument(format!(
                "existing stream of {existing_size} bytes cannot hold a terminator"
            ))));
        }
        let size = existing_size
            .checked_add(HEADER_LEN + entry_size)
            .ok_or_else(|| StreamError::InvalidArgument("combined stream size overflows".into()))?;

        let inner = Cursor::new(declared.to_be_bytes())
            .chain(ExactSizeReader::new(entry, entry_size)?)
            .chain(ExactSizeReader::new(existing, existing_size)?);
        debug!(entry_size, existing_size, size, "entry prepended to multiplexed stream");
        Ok(Self { inner, size })
    }

    /// Total length of the combined stream.
    pub fn size(&self) -> u64 { self.size }
}

impl<E: Read, S: Read> Read for PrependedMultiplexReader<E, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.inner.read(buf) }
}
