use std::io::{self, Read};

use tracing::{debug, warn};

use crate::hasher::{AnyHasher, Hasher};
use crate::{ExpectedDigest, Result, VerificationError};

enum Outcome {
    Valid,
    Invalid(String),
}

/// Reader that folds every delivered byte into a digest and validates it
/// against an expected value the first time the source reports EOF.
///
/// A mismatch surfaces as an `io::Error` of kind `InvalidData` wrapping
/// [`VerificationError::Mismatch`], in place of the EOF. Later reads replay
/// the recorded outcome without hashing again.
pub struct DigestReader<R, H = AnyHasher> {
    reader:     R,
    hasher:     Option<H>,
    expected:   ExpectedDigest,
    actual:     Option<String>,
    outcome:    Option<Outcome>,
    bytes_read: u64,
}

impl<R: Read> DigestReader<R> {
    pub fn new(reader: R, expected: ExpectedDigest) -> Self {
        let hasher = expected.algorithm().hasher();
        Self::with_hasher(reader, hasher, expected)
    }
}

impl<R: Read, H: Hasher> DigestReader<R, H> {
    /// Uses a caller-provided hasher; it must implement the algorithm
    /// named by `expected`.
    pub fn with_hasher(reader: R, hasher: H, expected: ExpectedDigest) -> Self {
        Self {
            reader,
            hasher: Some(hasher),
            expected,
            actual: None,
            outcome: None,
            bytes_read: 0,
        }
    }

    pub fn expected(&self) -> &ExpectedDigest { &self.expected }

    pub fn bytes_read(&self) -> u64 { self.bytes_read }

    /// Hex digest of the delivered content, once EOF has been observed.
    pub fn actual_hex(&self) -> Option<&str> { self.actual.as_deref() }

    pub fn is_validated(&self) -> bool { matches!(self.outcome, Some(Outcome::Valid)) }

    pub fn into_inner(self) -> R { self.reader }

    /// Reads to EOF, discarding content, and returns the validation result.
    pub fn finish(mut self) -> Result<u64> {
        io::copy(&mut self, &mut io::sink()).map_err(VerificationError::unwrap_io)?;
        Ok(self.bytes_read)
    }

    fn validate(&mut self) -> io::Result<usize> {
        if let Some(hasher) = self.hasher.take() {
            let actual = hex::encode(hasher.finalize());
            let outcome = if self.expected.matches_hex(&actual) {
                debug!(
                    algorithm = %self.expected.algorithm(),
                    bytes = self.bytes_read,
                    "digest validated"
                );
                Outcome::Valid
            } else {
                warn!(
                    expected = %self.expected,
                    actual = %actual,
                    bytes = self.bytes_read,
                    "digest mismatch at end of stream"
                );
                Outcome::Invalid(actual.clone())
            };
            self.actual = Some(actual);
            self.outcome = Some(outcome);
        }
        self.replay()
    }

    fn replay(&self) -> io::Result<usize> {
        match &self.outcome {
            Some(Outcome::Invalid(actual)) => Err(VerificationError::Mismatch {
                algorithm: self.expected.algorithm(),
                expected:  self.expected.hex().to_string(),
                actual:    actual.clone(),
            }
            .into()),
            _ => Ok(0),
        }
    }
}

impl<R: Read, H: Hasher> Read for DigestReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.outcome.is_some() {
            return self.replay();
        }
        let n = self.reader.read(buf)?;
        if n == 0 {
            return self.validate();
        }
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }
        self.bytes_read += n as u64;
        Ok(n)
    }
}
