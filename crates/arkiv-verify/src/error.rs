use std::io;

use crate::DigestAlgorithm;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("digest mismatch ({algorithm}): expected {expected}, got {actual}")]
    Mismatch {
        algorithm: DigestAlgorithm,
        expected:  String,
        actual:    String,
    },

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed {algorithm} digest '{digest}': {reason}")]
    MalformedDigest {
        algorithm: DigestAlgorithm,
        digest:    String,
        reason:    &'static str,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl VerificationError {
    /// Recovers a verification error carried inside an `io::Error`, as
    /// returned by [`DigestReader`](crate::DigestReader)'s `Read` impl.
    pub fn from_io(err: &io::Error) -> Option<&VerificationError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<VerificationError>())
    }

    /// Converts an `io::Error` back into the verification error it carries,
    /// or wraps it as [`VerificationError::Io`].
    pub fn unwrap_io(err: io::Error) -> Self {
        if Self::from_io(&err).is_none() {
            return Self::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<VerificationError>()) {
            Some(Ok(inner)) => *inner,
            _ => Self::Io(io::Error::other("digest validation failed")),
        }
    }

    pub fn is_mismatch(&self) -> bool { matches!(self, Self::Mismatch { .. }) }
}

impl From<VerificationError> for io::Error {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerificationError>;
