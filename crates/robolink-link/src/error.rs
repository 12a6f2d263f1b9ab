//! Error types for links and transports.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a [`crate::Transport`].
#[derive(Error, Debug)]
pub enum TransportError {
    /// The device is not connected.
    #[error("transport not connected")]
    NotConnected,

    /// The routing tag does not name a channel of this device.
    #[error("unknown routing tag: {0}")]
    UnknownRoute(String),

    /// The write was rejected by the device or the radio stack.
    #[error("write failed: {0}")]
    Write(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Creates a write failure.
    pub fn write(msg: impl Into<String>) -> Self {
        TransportError::Write(msg.into())
    }
}

/// Errors loading a [`crate::LinkConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid YAML for a link.
    #[error("invalid link configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors reported for a queued send.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The transport failed to write the frame.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The send was dropped from the queue before it ran.
    #[error("send cancelled before it reached the transport")]
    Cancelled,
}

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
