use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::copy::DEFAULT_COPY_BUFFER_SIZE;
use crate::{Result, StreamError};

pub const DEFAULT_CAPACITY: usize = 65_536;

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct FanOutOptions {
    capacity: usize,
}

impl Default for FanOutOptions {
    fn default() -> Self { Self::new() }
}

impl FanOutOptions {
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Size in bytes of the circular buffer shared by all readers.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn get_capacity(&self) -> usize { self.capacity }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    buffer_size:     usize,
    max_idle:        usize,
    max_outstanding: Option<usize>,
}

impl Default for PoolOptions {
    fn default() -> Self { Self::new() }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self {
            buffer_size:     DEFAULT_CAPACITY,
            max_idle:        16,
            max_outstanding: None,
        }
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Released buffers kept for reuse; extra ones are freed.
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Hard cap on buffers handed out at once. `None` allocates past any
    /// count.
    pub fn max_outstanding(mut self, max_outstanding: Option<usize>) -> Self {
        self.max_outstanding = max_outstanding;
        self
    }

    pub fn get_buffer_size(&self) -> usize { self.buffer_size }

    pub fn get_max_idle(&self) -> usize { self.max_idle }

    pub fn get_max_outstanding(&self) -> Option<usize> { self.max_outstanding }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PumpOptions {
    chunk_size:     usize,
    retry_delay_ms: u64,
    max_retries:    u32,
    thread_name:    String,
}

impl Default for PumpOptions {
    fn default() -> Self { Self::new() }
}

impl PumpOptions {
    pub fn new() -> Self {
        Self {
            chunk_size:     DEFAULT_CAPACITY,
            retry_delay_ms: 10,
            max_retries:    600,
            thread_name:    "arkiv-pump".to_string(),
        }
    }

    /// Largest read issued against the source; capped to the fan-out
    /// capacity.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Pause before re-reading a source that reported `WouldBlock`.
    pub fn retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Consecutive `WouldBlock` results tolerated before giving up.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    pub fn get_chunk_size(&self) -> usize { self.chunk_size }

    pub fn get_retry_delay(&self) -> Duration { Duration::from_millis(self.retry_delay_ms) }

    pub fn get_max_retries(&self) -> u32 { self.max_retries }

    pub fn get_thread_name(&self) -> &str { &self.thread_name }
}

/// Settings for every streaming component, loadable from TOML.
///
/// ```toml
/// copy_buffer_size = 65536
///
/// [fanout]
/// capacity = 1048576
///
/// [pool]
/// buffer_size = 1048576
/// max_idle = 8
/// max_outstanding = 64
///
/// [pump]
/// chunk_size = 65536
/// retry_delay_ms = 10
/// max_retries = 600
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub copy_buffer_size: usize,
    pub fanout:           FanOutOptions,
    pub pool:             PoolOptions,
    pub pump:             PumpOptions,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            fanout:           FanOutOptions::default(),
            pool:             PoolOptions::default(),
            pump:             PumpOptions::default(),
        }
    }
}

impl StreamConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("copy_buffer_size", self.copy_buffer_size),
            ("fanout.capacity", self.fanout.capacity),
            ("pool.buffer_size", self.pool.buffer_size),
            ("pump.chunk_size", self.pump.chunk_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(StreamError::invalid(format!("{name} must be positive")));
            }
        }
        if self.pool.max_outstanding == Some(0) {
            return Err(StreamError::invalid("pool.max_outstanding must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.fanout.get_capacity(), 65_536);
        assert_eq!(config.pump.get_retry_delay(), Duration::from_millis(10));
        assert_eq!(config.pool.get_max_outstanding(), None);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml() {
        let config = StreamConfig::from_toml_str(
            r#"
            [fanout]
            capacity = 16

            [pool]
            max_outstanding = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.fanout.get_capacity(), 16);
        assert_eq!(config.pool.get_max_outstanding(), Some(4));
        assert_eq!(config.pool.get_max_idle(), 16);
        assert_eq!(config.pump.get_thread_name(), "arkiv-pump");
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = StreamConfig::from_toml_str("[fanout]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, StreamError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = StreamConfig::from_toml_str("[fanout\ncapacity = 1").unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "copy_buffer_size = 4096\n[pump]\nmax_retries = 3").unwrap();
        let config = StreamConfig::load(file.path()).unwrap();
        assert_eq!(config.copy_buffer_size, 4096);
        assert_eq!(config.pump.get_max_retries(), 3);
    }

    #[test]
    fn test_builders() {
        let pump = PumpOptions::new().chunk_size(512).retry_delay_ms(1).thread_name("offer-1");
        assert_eq!(pump.get_chunk_size(), 512);
        assert_eq!(pump.get_thread_name(), "offer-1");
        let pool = PoolOptions::new().buffer_size(32).max_idle(0).max_outstanding(Some(2));
        assert_eq!(pool.get_buffer_size(), 32);
        assert_eq!(pool.get_max_idle(), 0);
    }
}
