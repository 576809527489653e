use std::io::{self, Read, Write};

use tracing::debug;

use crate::{Result, StreamError};

pub const DEFAULT_COPY_BUFFER_SIZE: usize = 65_536;

/// Copies every byte of `source` into `destination` and returns the count.
pub fn copy<R, W>(source: &mut R, destination: &mut W) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    copy_with_buffer(source, destination, DEFAULT_COPY_BUFFER_SIZE)
}

/// Copies through one fixed buffer of `buffer_size` bytes.
///
/// Each round fills the free tail of the buffer, offers everything buffered
/// to a single `write`, and compacts what the destination did not accept to
/// the front. Bytes still buffered when the source reports EOF are written out
/// in full before returning.
pub fn copy_with_buffer<R, W>(source: &mut R, destination: &mut W, buffer_size: usize) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    if buffer_size == 0 {
        return Err(StreamError::invalid("copy buffer size must be positive"));
    }
    let mut buffer = vec![0u8; buffer_size];
    let mut filled = 0usize;
    let mut total = 0u64;

    loop {
        if filled < buffer.len() {
            match source.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StreamError::unwrap_io(e)),
            }
        }
        match destination.write(&buffer[..filled]) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(written) => {
                buffer.copy_within(written..filled, 0);
                filled -= written;
                total += written as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(StreamError::unwrap_io(e)),
        }
    }

    destination
        .write_all(&buffer[..filled])
        .map_err(StreamError::unwrap_io)?;
    total += filled as u64;
    Ok(total)
}

/// Consumes and discards whatever remains in an abandoned stream, then drops
/// it. I/O errors are swallowed; returns the number of bytes discarded.
///
/// Dropping a fan-out reader closes its gate, so abandoning one consumer this
/// way never stalls the producer.
pub fn drain_and_close<R: Read>(mut source: R) -> u64 {
    let mut buffer = [0u8; 8192];
    let mut discarded = 0u64;
    loop {
        match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => discarded += n as u64,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, discarded, "ignoring error while draining abandoned stream");
                break;
            }
        }
    }
    drop(source);
    discarded
}
