//! Errors decoding device replies.

use robolink_bytes::BytesError;
use thiserror::Error;

/// Errors decoding a frame received from a device.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The frame is shorter than its layout requires.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// The frame does not start with the protocol's sync bytes.
    #[error("bad frame header: {0:02x?}")]
    BadHeader(Vec<u8>),

    /// The frame's checksum does not match its contents.
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    /// The reply carries a value type this crate does not decode.
    #[error("unknown value type {0:#04x}")]
    UnknownValueType(u8),

    /// A field could not be decoded.
    #[error(transparent)]
    Bytes(#[from] BytesError),
}

impl DeviceError {
    /// Fails unless `frame` holds at least `expected` bytes.
    pub(crate) fn require(frame: &[u8], expected: usize) -> Result<(), DeviceError> {
        if frame.len() < expected {
            return Err(DeviceError::TooShort {
                expected,
                actual: frame.len(),
            });
        }
        Ok(())
    }
}

/// Result type alias for device decoding.
pub type DeviceResult<T> = Result<T, DeviceError>;
