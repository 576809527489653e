//! Bounded single-producer, multi-consumer fan-out buffer.
//!
//! One producer writes a byte stream once into a circular buffer of fixed
//! capacity `B`; each of `R` readers receives the full stream through its own
//! cursor and consumes it at its own pace. Every reader owns a [gate] that
//! accounts how much of the buffer it has not read yet, and the producer may
//! only write what fits in the smallest write side among open gates. Memory
//! stays bounded by `B` whatever `R` is, while fast readers run up to `B`
//! bytes ahead of slow ones.
//!
//! A reader that stops reading stalls the producer, and transitively every
//! other reader, until it is closed. Closing a reader (or dropping it) removes
//! its gate from the producer's constraint.
//!
//! End of stream is explicit: [`FanOutWriter::write_eof`] marks a clean end
//! and readers report EOF once drained. Closing the writer without it closes
//! every gate, and readers fail with [`StreamError::BrokenStream`] once
//! drained instead of seeing a silently truncated stream.
//!
//! ```
//! use std::io::Read;
//! use std::thread;
//! use arkiv_stream::{FanOut, FanOutOptions};
//!
//! let fanout = FanOut::new(2, FanOutOptions::new().capacity(16)).unwrap();
//! let (mut writer, readers) = fanout.split();
//!
//! let workers: Vec<_> = readers
//!     .into_iter()
//!     .map(|mut reader| {
//!         thread::spawn(move || {
//!             let mut out = Vec::new();
//!             reader.read_to_end(&mut out).unwrap();
//!             out
//!         })
//!     })
//!     .collect();
//!
//! writer.write_chunk(b"HELLOWORLD").unwrap();
//! writer.write_eof().unwrap();
//! writer.close();
//!
//! for worker in workers {
//!     assert_eq!(worker.join().unwrap(), b"HELLOWORLD");
//! }
//! ```
//!
//! [gate]: self::gate

mod gate;
mod reader;
mod writer;

pub use reader::FanOutReader;
pub use writer::FanOutWriter;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::config::{FanOutOptions, PoolOptions};
use crate::pool::{BufferPool, PooledBuffer};
use crate::{Result, StreamError};

use self::gate::Gate;

/// State shared by the writer and every reader of one fan-out buffer.
pub(crate) struct Shared {
    capacity:     usize,
    // One lock over the whole array. Readers copy out under the shared side
    // alongside each other; the producer's copy takes the exclusive side and
    // so briefly excludes every reader, even though the gates keep its region
    // disjoint from theirs. Per-region locking would need unsafe slicing.
    // Also guards the release of the buffer by the last reader.
    buffer:       RwLock<Option<PooledBuffer>>,
    gates:        Box<[Gate]>,
    eof:          AtomicBool,
    open_readers: AtomicUsize,
}

impl Shared {
    pub(crate) fn gate(&self, rank: usize) -> &Gate { &self.gates[rank] }

    pub(crate) fn gates(&self) -> &[Gate] { &self.gates }

    /// Called once per reader handle when it closes. The last one hands the
    /// circular buffer back to its pool.
    pub(crate) fn reader_closed(&self) {
        if self.open_readers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.buffer.write().take();
            debug!(capacity = self.capacity, "last reader closed, buffer released");
        }
    }

    pub(crate) fn signal_eof(&self) {
        self.eof.store(true, Ordering::Release);
        for gate in self.gates.iter() {
            gate.wake();
        }
    }
}

/// A fan-out buffer before its handles are taken.
///
/// Handles not taken when the `FanOut` is dropped are closed: an untaken
/// reader stops constraining the producer, an untaken writer ends the stream
/// as broken.
pub struct FanOut {
    shared:  Arc<Shared>,
    writer:  Option<FanOutWriter>,
    readers: Vec<Option<FanOutReader>>,
}

impl FanOut {
    /// Creates a fan-out buffer for `readers` consumers with a private buffer
    /// of `options.capacity` bytes.
    pub fn new(readers: usize, options: FanOutOptions) -> Result<Self> {
        let pool = BufferPool::new(
            PoolOptions::new()
                .buffer_size(options.get_capacity())
                .max_idle(0),
        )?;
        Self::with_pool(readers, &pool)
    }

    /// Creates a fan-out buffer whose circular buffer is borrowed from `pool`
    /// and returned once every reader has closed.
    pub fn with_pool(readers: usize, pool: &BufferPool) -> Result<Self> {
        if readers == 0 {
            return Err(StreamError::invalid("fan-out needs at least one reader"));
        }
        let buffer = pool.acquire()?;
        let capacity = buffer.len();
        let shared = Arc::new(Shared {
            capacity,
            buffer: RwLock::new(Some(buffer)),
            gates: (0..readers).map(|_| Gate::new(capacity)).collect(),
            eof: AtomicBool::new(false),
            open_readers: AtomicUsize::new(readers),
        });
        debug!(capacity, readers, "fan-out buffer created");
        Ok(Self {
            writer: Some(FanOutWriter::new(Arc::clone(&shared))),
            readers: (0..readers)
                .map(|rank| Some(FanOutReader::new(Arc::clone(&shared), rank)))
                .collect(),
            shared,
        })
    }

    pub fn capacity(&self) -> usize { self.shared.capacity }

    pub fn reader_count(&self) -> usize { self.readers.len() }

    /// Takes the single writer handle.
    pub fn writer(&mut self) -> Result<FanOutWriter> {
        self.writer
            .take()
            .ok_or_else(|| StreamError::invalid("fan-out writer already taken"))
    }

    /// Takes the reader handle for `rank`.
    pub fn reader(&mut self, rank: usize) -> Result<FanOutReader> {
        let count = self.readers.len();
        self.readers
            .get_mut(rank)
            .ok_or_else(|| StreamError::invalid(format!("rank {rank} out of range 0..{count}")))?
            .take()
            .ok_or_else(|| StreamError::invalid(format!("reader {rank} already taken")))
    }

    /// Takes the writer and every reader, in rank order.
    ///
    /// Handles already taken are absent from the result; call this on a fresh
    /// `FanOut` to get all of them.
    pub fn split(mut self) -> (FanOutWriter, Vec<FanOutReader>) {
        let readers = self.readers.iter_mut().filter_map(Option::take).collect();
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => FanOutWriter::closed(Arc::clone(&self.shared)),
        };
        (writer, readers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::AtomicU64;
    use std::thread;
    use std::time::Duration;

    fn read_exactly(reader: &mut FanOutReader, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = reader.read_chunk(&mut out[filled..]).unwrap();
            assert!(n > 0, "unexpected EOF");
            filled += n;
        }
        out
    }

    #[test]
    fn test_hello_world_two_readers() {
        let fanout = FanOut::new(2, FanOutOptions::new().capacity(16)).unwrap();
        let (mut writer, mut readers) = fanout.split();
        let mut r1 = readers.pop().unwrap();
        let mut r0 = readers.pop().unwrap();

        writer.write_chunk(b"HELLOWORLD").unwrap();
        writer.write_eof().unwrap();
        writer.close();

        let mut first = read_exactly(&mut r0, 3);
        first.extend(read_exactly(&mut r0, 7));
        assert_eq!(first, b"HELLOWORLD");

        let mut buf = [0u8; 10];
        assert_eq!(r1.read_chunk(&mut buf).unwrap(), 10);
        assert_eq!(&buf, b"HELLOWORLD");

        let mut probe = [0u8; 4];
        assert_eq!(r0.read_chunk(&mut probe).unwrap(), 0);
        assert_eq!(r1.read_chunk(&mut probe).unwrap(), 0);
    }

    #[test]
    fn test_read_returns_at_most_available() {
        let mut fanout = FanOut::new(1, FanOutOptions::new().capacity(8)).unwrap();
        let mut writer = fanout.writer().unwrap();
        let mut reader = fanout.reader(0).unwrap();

        writer.write_chunk(b"abc").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 3);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn test_wraps_around_capacity() {
        let mut fanout = FanOut::new(1, FanOutOptions::new().capacity(8)).unwrap();
        let mut writer = fanout.writer().unwrap();
        let mut reader = fanout.reader(0).unwrap();

        writer.write_chunk(b"012345").unwrap();
        assert_eq!(read_exactly(&mut reader, 6), b"012345");
        writer.write_chunk(b"6789abcd").unwrap();
        assert_eq!(read_exactly(&mut reader, 8), b"6789abcd");
    }

    #[test]
    fn test_usage_errors() {
        assert!(matches!(
            FanOut::new(0, FanOutOptions::new()),
            Err(StreamError::InvalidArgument(_))
        ));
        assert!(FanOut::new(1, FanOutOptions::new().capacity(0)).is_err());

        let mut fanout = FanOut::new(2, FanOutOptions::new().capacity(4)).unwrap();
        assert!(fanout.reader(2).is_err());
        let _r0 = fanout.reader(0).unwrap();
        assert!(matches!(fanout.reader(0), Err(StreamError::InvalidArgument(_))));

        let mut writer = fanout.writer().unwrap();
        assert!(fanout.writer().is_err());
        assert!(matches!(writer.write_chunk(&[0u8; 5]), Err(StreamError::InvalidArgument(_))));
    }

    #[test]
    fn test_producer_never_exceeds_capacity_ahead_of_stalled_reader() {
        let fanout = FanOut::new(2, FanOutOptions::new().capacity(16)).unwrap();
        let (mut writer, mut readers) = fanout.split();
        let stalled = readers.pop().unwrap();
        let mut fast = readers.pop().unwrap();

        let written = Arc::new(AtomicU64::new(0));
        let producer = {
            let written = Arc::clone(&written);
            thread::spawn(move || {
                for i in 0..64u8 {
                    writer.write_chunk(&[i]).unwrap();
                    written.fetch_add(1, Ordering::SeqCst);
                }
                writer.write_eof().unwrap();
            })
        };

        let mut seen = Vec::new();
        let mut buf = [0u8; 4];
        while seen.len() < 16 {
            let n = fast.read_chunk(&mut buf).unwrap();
            seen.extend_from_slice(&buf[..n]);
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(written.load(Ordering::SeqCst), 16);
        assert!(!producer.is_finished());

        drop(stalled);
        fast.read_to_end(&mut seen).unwrap();
        producer.join().unwrap();
        assert_eq!(seen, (0..64u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_buffer_returns_to_pool_after_last_reader() {
        let pool = BufferPool::new(PoolOptions::new().buffer_size(32).max_idle(4)).unwrap();
        let fanout = FanOut::with_pool(2, &pool).unwrap();
        assert_eq!(fanout.capacity(), 32);
        assert_eq!(pool.outstanding(), 1);

        let (writer, mut readers) = fanout.split();
        drop(writer);
        readers.pop().unwrap().close();
        assert_eq!(pool.outstanding(), 1);
        readers.pop().unwrap().close();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_untaken_handles_close_on_drop() {
        let mut fanout = FanOut::new(2, FanOutOptions::new().capacity(4)).unwrap();
        let mut writer = fanout.writer().unwrap();
        let mut reader = fanout.reader(0).unwrap();
        drop(fanout);

        // rank 1 was never taken and must not block the producer
        writer.write_chunk(b"abcd").unwrap();
        assert_eq!(read_exactly(&mut reader, 4), b"abcd");
        writer.write_chunk(b"efgh").unwrap();
        assert_eq!(read_exactly(&mut reader, 4), b"efgh");
    }
}
