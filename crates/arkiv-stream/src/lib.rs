//! Stream plumbing for archive transfers.
//!
//! - [`FanOut`]: one producer, many readers, one bounded circular buffer.
//! - [`FanOutPump`]: drives a `FanOut` from any `Read` on its own thread.
//! - [`ExactSizeReader`]: fails unless the source holds exactly the declared
//!   number of bytes.
//! - [`copy`] and [`drain_and_close`]: bulk copy through one fixed buffer, and
//!   abandoning a stream without leaving its producer stalled.
//! - [`BufferPool`]: reusable fixed-size buffers for fan-out instances.
//!
//! Errors crossing `io::Read`/`io::Write` boundaries carry a [`StreamError`]
//! inside the `io::Error`; [`StreamError::from_io`] recovers it.

pub use self::config::{DEFAULT_CAPACITY, FanOutOptions, PoolOptions, PumpOptions, StreamConfig};
pub use self::copy::{DEFAULT_COPY_BUFFER_SIZE, copy, copy_with_buffer, drain_and_close};
pub use self::error::{Result, StreamError};
pub use self::exact::ExactSizeReader;
pub use self::fanout::{FanOut, FanOutReader, FanOutWriter};
pub use self::pool::{BufferPool, PooledBuffer};
pub use self::pump::FanOutPump;

mod config;
mod copy;
mod error;
mod exact;
mod fanout;
mod pool;
mod pump;
