//! Device link: the transport seam plus the per-connection wiring of the
//! byte codec, command queue and frame reader.
//!
//! # Example
//!
//! ```rust
//! use robolink_bytes::LsbBuffer;
//! use robolink_link::{DeviceLink, MemoryTransport};
//! use robolink_stream::StreamReader;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = MemoryTransport::new();
//! let link = DeviceLink::new(transport.clone(), StreamReader::new());
//!
//! let mut frame = LsbBuffer::new();
//! frame.write_byte(0x01).write_short(500);
//! link.send(frame);
//! link.flush().await;
//!
//! assert_eq!(transport.sent()[0].bytes, vec![0x01, 0xF4, 0x01]);
//! # }
//! ```

mod config;
mod error;
mod link;
mod transport;

pub use config::LinkConfig;
pub use error::*;
pub use link::{DeviceLink, FrameExtractor};
pub use transport::{MemoryTransport, SentFrame, Transport};
