//! Streaming digest validation for archived objects.
//!
//! Wraps a byte stream so every delivered byte is folded into an incremental
//! digest, and validates the digest against a value fixed up front the moment
//! the stream reports end-of-file. Content altered in transit or at rest is
//! reported in place of the EOF, never silently.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use arkiv_verify::{DigestAlgorithm, DigestReader, ExpectedDigest};
//!
//! let data = b"hello world";
//! let expected = ExpectedDigest::of(DigestAlgorithm::Sha512, data);
//!
//! let mut reader = DigestReader::new(&data[..], expected);
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//! assert!(reader.is_validated());
//! ```

pub use self::algorithm::{DigestAlgorithm, ExpectedDigest};
pub use self::error::{Result, VerificationError};
pub use self::hasher::{
    AnyHasher, DigestHasher, Hasher, Sha256Hasher, Sha384Hasher, Sha512Hasher,
};
pub use self::reader::DigestReader;

#[cfg(feature = "blake3")]
pub use self::hasher::Blake3Hasher;

mod algorithm;
mod error;
mod hasher;
mod reader;
