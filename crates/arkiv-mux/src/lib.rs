//! Size-prefixed multiplexing of several byte streams into one.
//!
//! Wire format, big-endian, no padding:
//!
//! ```text
//! entry*  terminator
//! entry      = size:int64 payload:byte[size]   ; size >= 0
//! terminator = marker:int64                     ; marker == -1
//! ```
//!
//! There is no entry count; a stream of entries with sizes `s_i` is
//! `sum(8 + s_i) + 8` bytes long ([`multiplexed_size`]).

pub use self::error::{MuxError, Result};
pub use self::prepend::PrependedMultiplexReader;
pub use self::reader::{Entry, MultiplexReader};
pub use self::writer::{MultiplexWriter, multiplexed_size};

mod error;
mod prepend;
mod reader;
mod writer;

/// Length of an entry size prefix, and of the terminator.
pub const HEADER_LEN: u64 = 8;

/// Size marker closing a multiplexed stream.
pub const END_OF_STREAM: i64 = -1;
