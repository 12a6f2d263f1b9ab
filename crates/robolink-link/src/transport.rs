//! Transport seam.
//!
//! The link layer never opens a connection itself. A [`Transport`] writes one
//! frame at a time; inbound bytes are pushed to
//! [`crate::DeviceLink::deliver`] by whoever owns the radio.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TransportError;

/// Outbound half of a device connection.
pub trait Transport: Send + Sync + 'static {
    /// Writes one frame.
    ///
    /// `routing_tag` names the logical channel for transports that have more
    /// than one (for example a GATT characteristic).
    fn send(
        &self,
        bytes: Vec<u8>,
        routing_tag: Option<String>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// One frame written to a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub bytes: Vec<u8>,
    pub routing_tag: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    sent: Vec<SentFrame>,
    failures: VecDeque<TransportError>,
    connected: bool,
}

/// In-process transport that records every frame.
///
/// Used for loopback setups and tests. Clones share the same record.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Creates a connected transport.
    pub fn new() -> Self {
        MemoryTransport {
            state: Arc::new(Mutex::new(MemoryState {
                connected: true,
                ..MemoryState::default()
            })),
        }
    }

    /// Frames written so far.
    pub fn sent(&self) -> Vec<SentFrame> {
        self.state.lock().sent.clone()
    }

    /// Removes and returns the frames written so far.
    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut self.state.lock().sent)
    }

    /// Makes the next send fail with `err`. Failures queue up in order.
    pub fn fail_next(&self, err: TransportError) {
        self.state.lock().failures.push_back(err);
    }

    /// Marks the transport connected or disconnected.
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, bytes: Vec<u8>, routing_tag: Option<String>) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        state.sent.push(SentFrame { bytes, routing_tag });
        Ok(())
    }
}
