//! Exact-size guard.
//!
//! [`ExactSizeReader`] enforces that a source delivers precisely its declared
//! number of bytes. A short source fails with [`StreamError::PrematureEof`];
//! a long one fails with [`StreamError::TooLong`] as soon as the declared size
//! is reached, because the guard immediately probes for EOF instead of waiting
//! for the caller's next read. A mismatch, once reported, is reported again by
//! every later read. The guard does not implement `Seek`: a rewind would break
//! the one-pass byte accounting.

use std::io::{self, Read};

use tracing::{debug, warn};

use crate::{Result, StreamError};

/// Size failure recorded by the guard. Once set, every later read and skip
/// reports it again.
#[derive(Clone, Copy, Debug)]
enum Mismatch {
    Short { actual: u64 },
    Long,
}

pub struct ExactSizeReader<R> {
    inner:     R,
    expected:  u64,
    delivered: u64,
    eof:       bool,
    mismatch:  Option<Mismatch>,
}

impl<R: Read> ExactSizeReader<R> {
    /// Wraps `inner`, declaring it holds exactly `expected` bytes.
    ///
    /// For `expected == 0` one byte is probed right away, so a mismatch is
    /// reported before anything depending on the declared size is committed.
    /// Any other probe failure is left for the first read.
    pub fn new(inner: R, expected: u64) -> Result<Self> {
        let mut reader = Self {
            inner,
            expected,
            delivered: 0,
            eof: false,
            mismatch: None,
        };
        if expected == 0 {
            reader.probe_eof()?;
        }
        Ok(reader)
    }

    pub fn declared_size(&self) -> u64 { self.expected }

    pub fn delivered(&self) -> u64 { self.delivered }

    pub fn remaining(&self) -> u64 { self.expected - self.delivered }

    /// Whether the source's EOF has been confirmed at the declared size.
    pub fn is_eof(&self) -> bool { self.eof }

    /// Whether a size mismatch has been detected.
    pub fn is_failed(&self) -> bool { self.mismatch.is_some() }

    pub fn into_inner(self) -> R { self.inner }

    /// Discards up to `n` bytes, never past the declared size, and returns
    /// how many were skipped.
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        if let Some(err) = self.failure() {
            return Err(err);
        }
        let n = n.min(self.remaining());
        io::copy(&mut self.by_ref().take(n), &mut io::sink()).map_err(StreamError::unwrap_io)
    }

    fn failure(&self) -> Option<StreamError> { self.mismatch.map(|mismatch| self.error(mismatch)) }

    fn error(&self, mismatch: Mismatch) -> StreamError {
        match mismatch {
            Mismatch::Short { actual } => StreamError::PrematureEof {
                expected: self.expected,
                actual,
            },
            Mismatch::Long => StreamError::TooLong {
                expected: self.expected,
            },
        }
    }

    fn fail(&mut self, mismatch: Mismatch) -> StreamError {
        self.mismatch = Some(mismatch);
        match mismatch {
            Mismatch::Short { actual } => {
                warn!(expected = self.expected, actual, "premature EOF on sized stream")
            }
            Mismatch::Long => warn!(expected = self.expected, "stream longer than declared"),
        }
        self.error(mismatch)
    }

    /// Reads one byte past the declared size. Only an extra byte is a size
    /// failure; source errors are returned as they are and leave the guard
    /// ready to probe again.
    fn expect_eof(&mut self) -> Result<()> {
        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(_) => return Err(self.fail(Mismatch::Long)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Eager variant of [`expect_eof`](Self::expect_eof): a source error is
    /// deferred to the next read instead of being reported now.
    fn probe_eof(&mut self) -> Result<()> {
        match self.expect_eof() {
            Err(e) if self.mismatch.is_none() => {
                debug!(error = %e, "end of stream check deferred");
                Ok(())
            }
            other => other,
        }
    }
}

impl<R: Read> Read for ExactSizeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.failure() {
            return Err(err.into());
        }
        if buf.is_empty() || self.eof {
            return Ok(0);
        }
        let remaining = self.remaining();
        if remaining == 0 {
            self.expect_eof()?;
            return Ok(0);
        }
        let cap = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..cap])?;
        if n == 0 {
            let actual = self.delivered;
            return Err(self.fail(Mismatch::Short { actual }).into());
        }
        self.delivered += n as u64;
        if self.delivered == self.expected {
            self.probe_eof()?;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(reader: &mut impl Read) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        Ok(out)
    }

    fn source(len: usize) -> Cursor<Vec<u8>> { Cursor::new((0..len).map(|i| (i % 251) as u8).collect()) }

    /// Delivers its data, then reports `WouldBlock` `blocks` times before EOF.
    struct LateEof {
        data:   Cursor<Vec<u8>>,
        blocks: usize,
    }

    impl LateEof {
        fn new(data: &[u8], blocks: usize) -> Self {
            Self {
                data: Cursor::new(data.to_vec()),
                blocks,
            }
        }
    }

    impl Read for LateEof {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 && self.blocks > 0 {
                self.blocks -= 1;
                return Err(io::ErrorKind::WouldBlock.into());
            }
            Ok(n)
        }
    }

    #[test]
    fn test_exact_sizes_pass() {
        for len in [1usize, 7, 65_536 * 3 + 17] {
            let mut reader = ExactSizeReader::new(source(len), len as u64).unwrap();
            let out = read_all(&mut reader).unwrap();
            assert_eq!(out, source(len).into_inner());
            assert!(reader.is_eof());
            assert_eq!(reader.delivered(), len as u64);
        }
    }

    #[test]
    fn test_zero_size_probes_at_construction() {
        let reader = ExactSizeReader::new(Cursor::new(Vec::new()), 0).unwrap();
        assert!(reader.is_eof());

        let err = ExactSizeReader::new(Cursor::new(vec![1u8]), 0).err().unwrap();
        assert!(matches!(err, StreamError::TooLong { expected: 0 }));
    }

    #[test]
    fn test_short_source_fails() {
        let mut reader = ExactSizeReader::new(source(9), 10).unwrap();
        let err = read_all(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(matches!(
            StreamError::from_io(&err),
            Some(StreamError::PrematureEof { expected: 10, actual: 9 })
        ));
    }

    #[test]
    fn test_long_source_fails_at_declared_size() {
        let mut reader = ExactSizeReader::new(source(11), 10).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        let err = reader.read(&mut buf).unwrap_err();
        assert!(matches!(
            StreamError::from_io(&err),
            Some(StreamError::TooLong { expected: 10 })
        ));
    }

    #[test]
    fn test_reads_are_capped() {
        let mut reader = ExactSizeReader::new(source(5), 5).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_skip_is_capped() {
        let mut reader = ExactSizeReader::new(source(10), 10).unwrap();
        assert_eq!(reader.skip(4).unwrap(), 4);
        assert_eq!(reader.skip(100).unwrap(), 6);
        assert!(reader.is_eof());
        assert_eq!(reader.skip(1).unwrap(), 0);
    }

    #[test]
    fn test_skip_detects_long_source() {
        let mut reader = ExactSizeReader::new(source(12), 10).unwrap();
        assert!(matches!(reader.skip(20), Err(StreamError::TooLong { .. })));
    }

    #[test]
    fn test_pending_eof_keeps_the_last_chunk() {
        let mut reader = ExactSizeReader::new(LateEof::new(b"HELLOWORLD", 2), 10).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(reader.read(&mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], b"HELLOWORLD");
        assert!(!reader.is_eof());

        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(reader.is_eof());
        assert!(!reader.is_failed());
    }

    #[test]
    fn test_pending_eof_through_read_to_end() {
        let mut reader = ExactSizeReader::new(LateEof::new(b"HELLOWORLD", 1), 10).unwrap();
        assert_eq!(read_all(&mut reader).unwrap(), b"HELLOWORLD");
        assert!(reader.is_eof());
    }

    #[test]
    fn test_pending_eof_at_zero_size_is_deferred() {
        let mut reader = ExactSizeReader::new(LateEof::new(b"", 2), 0).unwrap();
        assert!(!reader.is_eof());
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap_err().kind(), io::ErrorKind::WouldBlock);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(reader.is_eof());
    }

    #[test]
    fn test_too_long_is_reported_again() {
        let mut reader = ExactSizeReader::new(Cursor::new(b"abcdX".to_vec()), 4).unwrap();
        let mut buf = [0u8; 16];
        for _ in 0..3 {
            let err = reader.read(&mut buf).unwrap_err();
            assert!(matches!(
                StreamError::from_io(&err),
                Some(StreamError::TooLong { expected: 4 })
            ));
        }
        assert!(reader.is_failed());
        assert!(!reader.is_eof());
        assert!(matches!(reader.skip(1), Err(StreamError::TooLong { expected: 4 })));
    }

    #[test]
    fn test_premature_eof_is_reported_again() {
        let mut reader = ExactSizeReader::new(source(3), 5).unwrap();
        assert!(read_all(&mut reader).is_err());
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert!(matches!(
            StreamError::from_io(&err),
            Some(StreamError::PrematureEof { expected: 5, actual: 3 })
        ));
    }
}
