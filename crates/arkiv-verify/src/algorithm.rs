use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::hasher::{AnyHasher, DigestHasher, Hasher};
use crate::{Result, VerificationError};

/// Digest algorithms accepted for end-to-end validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    #[default]
    Sha512,
    #[cfg(feature = "blake3")]
    Blake3,
}

impl DigestAlgorithm {
    /// Digest length in bytes.
    pub fn digest_length(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
            #[cfg(feature = "blake3")]
            Self::Blake3 => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            #[cfg(feature = "blake3")]
            Self::Blake3 => "blake3",
        }
    }

    pub fn hasher(&self) -> AnyHasher {
        match self {
            Self::Sha256 => AnyHasher::Sha256(DigestHasher::new()),
            Self::Sha384 => AnyHasher::Sha384(DigestHasher::new()),
            Self::Sha512 => AnyHasher::Sha512(DigestHasher::new()),
            #[cfg(feature = "blake3")]
            Self::Blake3 => AnyHasher::Blake3(crate::Blake3Hasher::new()),
        }
    }

    /// Lowercase hex digest of `data`.
    pub fn digest_hex(&self, data: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DigestAlgorithm {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            #[cfg(feature = "blake3")]
            "blake3" => Ok(Self::Blake3),
            _ => Err(VerificationError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// A digest the content is expected to hash to, fixed before the transfer starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    algorithm: DigestAlgorithm,
    hex:       String,
}

impl ExpectedDigest {
    /// Validates length and hex alphabet; the digest is stored lowercase.
    pub fn new(algorithm: DigestAlgorithm, hex: &str) -> Result<Self> {
        let malformed = |reason| VerificationError::MalformedDigest {
            algorithm,
            digest: hex.to_string(),
            reason,
        };
        if hex.len() != algorithm.digest_length() * 2 {
            return Err(malformed("wrong length"));
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed("not hexadecimal"));
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    pub fn of(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            hex: algorithm.digest_hex(data),
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm { self.algorithm }

    pub fn hex(&self) -> &str { &self.hex }

    pub fn matches_hex(&self, actual: &str) -> bool { self.hex.eq_ignore_ascii_case(actual) }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Parses `algorithm:hex`, or a bare hex digest whose algorithm is inferred
/// from its length (64 → sha256, 96 → sha384, 128 → sha512).
impl FromStr for ExpectedDigest {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some((algo, hex)) = s.split_once(':') {
            return Self::new(algo.parse()?, hex);
        }
        let algorithm = match s.len() {
            64 => DigestAlgorithm::Sha256,
            96 => DigestAlgorithm::Sha384,
            128 => DigestAlgorithm::Sha512,
            _ => {
                return Err(VerificationError::MalformedDigest {
                    algorithm: DigestAlgorithm::default(),
                    digest:    s.to_string(),
                    reason:    "cannot infer algorithm from length",
                });
            }
        };
        Self::new(algorithm, s)
    }
}
