//! Streaming core for replicated archive storage.
//!
//! Reads an object once and writes identical copies to several storage
//! backends at once with bounded memory, checking every copy against a
//! declared size and, optionally, a content digest.
//!
//! ```
//! use std::io::Cursor;
//! use arkiv::{ArkivConfig, DigestAlgorithm, ExpectedDigest, Transfer, replicate};
//!
//! let object = b"archived object".to_vec();
//! let transfer = Transfer::new(object.len() as u64)
//!     .digest(ExpectedDigest::of(DigestAlgorithm::Sha512, &object));
//!
//! let sinks = vec![Vec::<u8>::new(), Vec::new(), Vec::new()];
//! let report = replicate(Cursor::new(object.clone()), &transfer, sinks, &ArkivConfig::default()).unwrap();
//! assert!(report.all_succeeded());
//! for outcome in report.into_parts().1 {
//!     assert_eq!(outcome.into_sink().unwrap(), object);
//! }
//! ```
//!
//! The building blocks live in [`stream`], [`verify`] and [`mux`].

pub use arkiv_mux as mux;
pub use arkiv_stream as stream;
pub use arkiv_verify as verify;

pub use arkiv_mux::{MultiplexReader, MultiplexWriter, MuxError, PrependedMultiplexReader, multiplexed_size};
pub use arkiv_stream::{
    BufferPool, ExactSizeReader, FanOut, FanOutOptions, FanOutPump, FanOutReader, FanOutWriter, PoolOptions,
    PumpOptions, StreamConfig, StreamError, copy, drain_and_close,
};
pub use arkiv_verify::{DigestAlgorithm, DigestReader, ExpectedDigest, VerificationError};

pub use self::config::ArkivConfig;
pub use self::error::{ArkivError, Result};
pub use self::replicate::{ReplicationReport, Replicator, SinkOutcome, Transfer, replicate};

mod config;
mod error;
mod replicate;
