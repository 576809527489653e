use std::path::Path;

use arkiv_stream::StreamConfig;
use arkiv_verify::{DigestAlgorithm, ExpectedDigest};
use serde::Deserialize;

use crate::Result;

/// Top-level settings.
///
/// ```toml
/// default_digest = "sha512"
///
/// [stream]
/// copy_buffer_size = 65536
///
/// [stream.fanout]
/// capacity = 1048576
///
/// [stream.pool]
/// max_outstanding = 64
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArkivConfig {
    /// Algorithm assumed for bare hex digests.
    pub default_digest: DigestAlgorithm,
    pub stream:         StreamConfig,
}

impl ArkivConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.stream.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parses `hex` as a digest computed with [`default_digest`](Self::default_digest).
    pub fn expected_digest(&self, hex: &str) -> Result<ExpectedDigest> {
        Ok(ExpectedDigest::new(self.default_digest, hex)?)
    }
}
