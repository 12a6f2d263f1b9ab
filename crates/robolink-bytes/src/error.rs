//! Error types for byte decoding.

use thiserror::Error;

/// Errors returned by the decoding helpers in [`crate::tools`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BytesError {
    /// Input is too short for the requested value.
    #[error("input too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Bytes the decoder needs.
        expected: usize,
        /// Bytes that were supplied.
        actual: usize,
    },
}

impl BytesError {
    /// Fails unless `data` holds at least `expected` bytes.
    pub(crate) fn require(data: &[u8], expected: usize) -> Result<(), BytesError> {
        if data.len() < expected {
            return Err(BytesError::TooShort {
                expected,
                actual: data.len(),
            });
        }
        Ok(())
    }
}

/// Result type alias for byte decoding.
pub type BytesResult<T> = Result<T, BytesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BytesError::TooShort {
            expected: 4,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "input too short: expected at least 4 bytes, got 1"
        );
    }

    #[test]
    fn test_require() {
        assert!(BytesError::require(&[1, 2], 2).is_ok());
        assert!(BytesError::require(&[1], 2).is_err());
    }
}
