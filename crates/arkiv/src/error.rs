use std::io;

use arkiv_mux::MuxError;
use arkiv_stream::StreamError;
use arkiv_verify::VerificationError;

#[derive(Debug, thiserror::Error)]
pub enum ArkivError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("sink worker {0} panicked")]
    WorkerPanicked(usize),

    #[error(transparent)]
    Io(io::Error),
}

impl ArkivError {
    /// Unwraps a plain I/O error carried by a stream error, so a digest
    /// failure raised deep inside a copy is reported as one.
    pub fn from_stream(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => Self::from(e),
            other => Self::Stream(other),
        }
    }

    pub fn is_size_mismatch(&self) -> bool {
        match self {
            Self::Stream(e) => e.is_size_mismatch(),
            Self::Mux(e) => e.is_size_mismatch(),
            _ => false,
        }
    }

    pub fn is_digest_mismatch(&self) -> bool { matches!(self, Self::Verification(e) if e.is_mismatch()) }

    pub fn is_broken_stream(&self) -> bool { matches!(self, Self::Stream(e) if e.is_broken_stream()) }
}

impl From<io::Error> for ArkivError {
    fn from(err: io::Error) -> Self {
        if VerificationError::from_io(&err).is_some() {
            return Self::Verification(VerificationError::unwrap_io(err));
        }
        if StreamError::from_io(&err).is_some() {
            return Self::Stream(StreamError::unwrap_io(err));
        }
        if MuxError::from_io(&err).is_some() {
            return Self::Mux(MuxError::unwrap_io(err));
        }
        Self::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, ArkivError>;
