//! Background producer feeding a fan-out buffer from any `Read` source.

use std::io::{self, Read};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::config::{FanOutOptions, PumpOptions};
use crate::fanout::{FanOut, FanOutReader, FanOutWriter};
use crate::pool::BufferPool;
use crate::{Result, StreamError};

/// Copies a source into a [`FanOut`] on a dedicated thread.
///
/// The source is read in chunks of at most `chunk_size` bytes. A source that
/// reports `WouldBlock` is retried after `retry_delay` up to `max_retries`
/// consecutive times. Any other source error closes the writer without an end
/// of stream, so every reader fails instead of seeing a truncated stream.
pub struct FanOutPump {
    readers: Vec<Option<FanOutReader>>,
    handle:  Option<JoinHandle<Result<u64>>>,
}

impl FanOutPump {
    pub fn spawn<R>(source: R, readers: usize, fanout: FanOutOptions, options: PumpOptions) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Self::start(source, FanOut::new(readers, fanout)?, options)
    }

    pub fn spawn_with_pool<R>(source: R, readers: usize, pool: &BufferPool, options: PumpOptions) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Self::start(source, FanOut::with_pool(readers, pool)?, options)
    }

    fn start<R>(source: R, fanout: FanOut, options: PumpOptions) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (writer, readers) = fanout.split();
        let handle = thread::Builder::new()
            .name(options.get_thread_name().to_string())
            .spawn(move || pump(source, writer, &options))?;
        Ok(Self {
            readers: readers.into_iter().map(Some).collect(),
            handle:  Some(handle),
        })
    }

    /// Takes the reader for `rank`.
    pub fn reader(&mut self, rank: usize) -> Result<FanOutReader> {
        let count = self.readers.len();
        self.readers
            .get_mut(rank)
            .ok_or_else(|| StreamError::invalid(format!("rank {rank} out of range 0..{count}")))?
            .take()
            .ok_or_else(|| StreamError::invalid(format!("reader {rank} already taken")))
    }

    /// Takes every reader not taken yet, in rank order.
    pub fn readers(&mut self) -> Vec<FanOutReader> {
        self.readers.iter_mut().filter_map(Option::take).collect()
    }

    pub fn is_finished(&self) -> bool { self.handle.as_ref().is_none_or(JoinHandle::is_finished) }

    /// Waits for the producer and returns how many bytes it published.
    ///
    /// Readers still held by the pump are closed first so they cannot stall
    /// the producer.
    pub fn join(mut self) -> Result<u64> {
        self.readers.clear();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StreamError::BrokenStream("pump thread panicked"))?,
            None => Err(StreamError::BrokenStream("pump already joined")),
        }
    }
}

fn pump<R: Read>(mut source: R, mut writer: FanOutWriter, options: &PumpOptions) -> Result<u64> {
    let mut chunk = vec![0u8; options.get_chunk_size().min(writer.capacity()).max(1)];
    let mut retries = 0u32;
    loop {
        match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                retries = 0;
                if let Err(e) = writer.write_chunk(&chunk[..n]) {
                    warn!(error = %e, written = writer.bytes_written(), "fan-out producer stopped");
                    return Err(e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock && retries < options.get_max_retries() => {
                retries += 1;
                thread::sleep(options.get_retry_delay());
            }
            Err(e) => {
                warn!(error = %e, written = writer.bytes_written(), "source failed, closing fan-out");
                writer.close();
                return Err(StreamError::unwrap_io(e));
            }
        }
    }
    writer.write_eof()?;
    writer.close();
    debug!(total = writer.bytes_written(), "source exhausted");
    Ok(writer.bytes_written())
}
