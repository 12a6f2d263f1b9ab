//! Stream frame synchronizer for robot radio links.
//!
//! Inbound bytes arrive in arbitrary slices. [`StreamReader`] buffers them,
//! aligns on the configured frame headers, and emits frames once they reach
//! the minimum size and pass the device checksum.
//!
//! # Example
//!
//! ```rust
//! use robolink_stream::StreamReader;
//!
//! let mut reader = StreamReader::new()
//!     .with_header(&[0xFF, 0x55])
//!     .with_minimum_size(4);
//!
//! assert_eq!(reader.read(&[0x00, 0xFF, 0x55]), None);
//! assert_eq!(reader.read(&[0x01, 0x02]), Some(vec![0xFF, 0x55, 0x01, 0x02]));
//! ```

mod config;
mod reader;

pub use config::{ByteSeq, ReaderConfig};
pub use reader::{ChecksumFn, StreamReader};
