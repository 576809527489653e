use std::io;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("broken stream: {0}")]
    BrokenStream(&'static str),

    #[error("premature EOF, expected size {expected} but got {actual}")]
    PrematureEof { expected: u64, actual: u64 },

    #[error("stream longer than declared size {expected}")]
    TooLong { expected: u64 },

    #[error("buffer pool exhausted ({outstanding} buffers outstanding)")]
    PoolExhausted { outstanding: usize },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StreamError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self { Self::InvalidArgument(msg.into()) }

    /// Recovers a stream error carried inside an `io::Error`, as returned by
    /// the `Read`/`Write` impls of this crate.
    pub fn from_io(err: &io::Error) -> Option<&StreamError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<StreamError>())
    }

    /// Converts an `io::Error` back into the stream error it carries, or wraps
    /// it as [`StreamError::Io`].
    pub fn unwrap_io(err: io::Error) -> Self {
        if Self::from_io(&err).is_none() {
            return Self::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<StreamError>()) {
            Some(Ok(inner)) => *inner,
            _ => Self::BrokenStream("unrecoverable stream error"),
        }
    }

    pub fn is_size_mismatch(&self) -> bool {
        matches!(self, Self::PrematureEof { .. } | Self::TooLong { .. })
    }

    pub fn is_broken_stream(&self) -> bool { matches!(self, Self::BrokenStream(_)) }

    fn kind(&self) -> io::ErrorKind {
        match self {
            Self::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            Self::BrokenStream(_) => io::ErrorKind::BrokenPipe,
            Self::PrematureEof { .. } => io::ErrorKind::UnexpectedEof,
            Self::TooLong { .. } | Self::Config(_) => io::ErrorKind::InvalidData,
            Self::PoolExhausted { .. } => io::ErrorKind::OutOfMemory,
            Self::Io(e) => e.kind(),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => e,
            other => io::Error::new(other.kind(), other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
