//! Byte tools and byte-buffer codec for robot wire frames.
//!
//! This crate holds the stateless pieces of the robolink stack:
//!
//! - [`tools`]: integer decoding, equality, concatenation and the byte
//!   sub-sequence search used to locate frame headers and footers.
//! - [`ByteBuffer`]: an ordered byte writer with optional per-field header
//!   bytes, generic over the byte order of multi-byte writes.
//!
//! # Example
//!
//! ```rust
//! use robolink_bytes::{DataType, LsbBuffer};
//!
//! let mut buffer = LsbBuffer::new();
//! buffer.set_header(DataType::Byte, 0x7E);
//! buffer.write_byte(5).write_short(0x0102);
//!
//! assert_eq!(buffer.as_slice(), &[0x7E, 0x05, 0x02, 0x01]);
//! ```

mod buffer;
mod error;
pub mod tools;
mod types;

pub use buffer::*;
pub use error::*;
pub use types::*;
