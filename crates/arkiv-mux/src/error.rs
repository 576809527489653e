use std::io;

use arkiv_stream::StreamError;

#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("invalid entry size {0}")]
    InvalidSize(i64),

    #[error("multiplexed stream ended without terminator")]
    MissingTerminator,

    #[error("multiplexed stream already terminated")]
    Finished,

    #[error("multiplexed stream aborted by an earlier failed entry")]
    Aborted,

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Io(io::Error),
}

impl MuxError {
    pub fn from_io(err: &io::Error) -> Option<&MuxError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<MuxError>())
    }

    /// Converts an `io::Error` into the typed error it carries: a stream error
    /// becomes [`MuxError::Stream`], anything untyped [`MuxError::Io`].
    pub fn unwrap_io(err: io::Error) -> Self {
        if StreamError::from_io(&err).is_some() {
            return Self::Stream(StreamError::unwrap_io(err));
        }
        if Self::from_io(&err).is_none() {
            return Self::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<MuxError>()) {
            Some(Ok(inner)) => *inner,
            _ => Self::Io(io::Error::other("unrecoverable multiplex error")),
        }
    }

    pub fn is_size_mismatch(&self) -> bool {
        matches!(self, Self::Stream(e) if e.is_size_mismatch())
    }
}

impl From<io::Error> for MuxError {
    fn from(err: io::Error) -> Self { Self::unwrap_io(err) }
}

impl From<MuxError> for io::Error {
    fn from(err: MuxError) -> Self {
        match err {
            MuxError::Io(e) => e,
            MuxError::Stream(e) => e.into(),
            MuxError::MissingTerminator => io::Error::new(io::ErrorKind::UnexpectedEof, MuxError::MissingTerminator),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
