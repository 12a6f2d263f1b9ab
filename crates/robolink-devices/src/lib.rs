//! Wire formats for the robots driven over robolink.
//!
//! Each module provides request builders returning ready-to-send buffers,
//! a preconfigured [`robolink_stream::StreamReader`] for replies, and reply
//! decoding where the device answers.
//!
//! | Module | Byte order | Envelope | Reply framing |
//! |--------|------------|----------|---------------|
//! | [`mbot`] | LSB | `FF 55 len` | header `FF 55`, footer `0D 0A` |
//! | [`sphero`] | MSB | `FF FF/FE` + checksum | headers `FF FF`/`FF FE`, declared length |
//! | [`wedo2`] | LSB | none, routing tag | GATT notifications |

mod error;
pub mod mbot;
pub mod sphero;
pub mod wedo2;

pub use error::*;
