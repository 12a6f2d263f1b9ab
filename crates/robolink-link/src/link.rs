//! Per-connection wiring of queue, reader and transport.
//!
//! ```text
//!  ByteBuffer ──send()──► StackQueue ──(one at a time)──► Transport::send
//!
//!  radio bytes ──deliver()──► StreamReader ──► frames
//! ```

use std::sync::Arc;
use std::time::Duration;

use robolink_bytes::{ByteBuffer, ByteOrder};
use robolink_metrics::{metric_defs, LinkLabels};
use robolink_stack::{StackEntry, StackQueue};
use robolink_stream::StreamReader;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult, TransportError};
use crate::transport::Transport;

/// Pulls one frame out of a reader, given the newly received bytes.
///
/// Called again with an empty chunk until it returns `None`, so one delivery
/// can yield several frames.
pub type FrameExtractor =
    Box<dyn Fn(&mut StreamReader, &[u8]) -> Option<Vec<u8>> + Send + Sync>;

/// One device connection.
///
/// Outbound frames go through a [`StackQueue`] so writes never overlap.
/// Inbound chunks go through a [`StreamReader`].
pub struct DeviceLink<T: Transport> {
    transport: Arc<T>,
    queue: StackQueue,
    reader: StreamReader,
    extractor: Option<FrameExtractor>,
    labels: LinkLabels,
}

impl<T: Transport> DeviceLink<T> {
    /// Creates a link with a default queue.
    pub fn new(transport: T, reader: StreamReader) -> Self {
        DeviceLink {
            transport: Arc::new(transport),
            queue: StackQueue::new(),
            reader,
            extractor: None,
            labels: LinkLabels::default(),
        }
    }

    /// Creates a link from configuration.
    ///
    /// A checksum predicate cannot be expressed in configuration; attach it
    /// with [`DeviceLink::reader_mut`] or build the reader yourself.
    pub fn from_config(transport: T, config: &LinkConfig) -> Self {
        DeviceLink {
            transport: Arc::new(transport),
            queue: StackQueue::with_config(config.queue),
            reader: StreamReader::from_config(&config.reader),
            extractor: None,
            labels: config.labels(),
        }
    }

    /// Sets the labels attached to this link's metrics.
    pub fn with_labels(mut self, labels: LinkLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Replaces the frame reader.
    pub fn with_reader(mut self, reader: StreamReader) -> Self {
        self.reader = reader;
        self
    }

    /// Extracts inbound frames with `extract` instead of plain header framing.
    pub fn with_frame_extractor<F>(mut self, extract: F) -> Self
    where
        F: Fn(&mut StreamReader, &[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        self.extractor = Some(Box::new(extract));
        self
    }

    /// Trims inbound frames to the length their header declares.
    ///
    /// See [`StreamReader::read_length_delimited`] for `frame_len`.
    pub fn with_frame_len<F>(self, frame_len: F) -> Self
    where
        F: Fn(&[u8]) -> Option<usize> + Send + Sync + 'static,
    {
        self.with_frame_extractor(move |reader, chunk| {
            reader.read_length_delimited(chunk, &frame_len)
        })
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The outbound queue.
    pub fn queue(&self) -> &StackQueue {
        &self.queue
    }

    /// The inbound frame reader.
    pub fn reader(&self) -> &StreamReader {
        &self.reader
    }

    /// Mutable access to the inbound frame reader.
    pub fn reader_mut(&mut self) -> &mut StreamReader {
        &mut self.reader
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    /// Queues a frame. Failures are logged and counted; the queue continues.
    pub fn send<E: ByteOrder>(&self, buffer: ByteBuffer<E>) {
        self.queue.enqueue(self.send_entry(buffer, None));
    }

    /// Queues a frame and reports its outcome to `on_done`.
    pub fn send_with<E, F>(&self, buffer: ByteBuffer<E>, on_done: F)
    where
        E: ByteOrder,
        F: FnOnce(LinkResult<()>) + Send + 'static,
    {
        self.queue
            .enqueue(self.send_entry(buffer, Some(Box::new(on_done))));
    }

    /// Queues several frames in order.
    pub fn send_all<E, I>(&self, buffers: I)
    where
        E: ByteOrder,
        I: IntoIterator<Item = ByteBuffer<E>>,
    {
        for buffer in buffers {
            self.send(buffer);
        }
    }

    /// Queues a frame and waits until it has been written.
    ///
    /// Resolves to [`LinkError::Cancelled`] if the queue is cleared first.
    pub async fn request<E: ByteOrder>(&self, buffer: ByteBuffer<E>) -> LinkResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send_with(buffer, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(LinkError::Cancelled))
    }

    /// Holds the queue for `duration` before the next frame.
    pub fn delay(&self, duration: Duration) {
        self.queue.enqueue_delay(duration);
    }

    /// Waits until every queued entry has run.
    pub async fn flush(&self) {
        self.queue.drained().await;
    }

    fn send_entry<E: ByteOrder>(
        &self,
        buffer: ByteBuffer<E>,
        on_done: Option<Box<dyn FnOnce(LinkResult<()>) + Send>>,
    ) -> StackEntry {
        let transport = Arc::clone(&self.transport);
        let labels = self.labels.to_labels();
        let device = self.labels.device.clone();
        let routing_tag = buffer.routing_tag().map(str::to_string);
        let bytes = buffer.into_bytes();

        StackEntry::async_command(move || async move {
            let len = bytes.len();
            let started = Instant::now();
            log::trace!("[{}] tx {} bytes {:02x?}", device, len, bytes);

            let result = transport.send(bytes, routing_tag).await;
            match &result {
                Ok(()) => {
                    metrics::counter!(metric_defs::LINK_TX_FRAMES.name, &labels).increment(1);
                    metrics::counter!(metric_defs::LINK_TX_BYTES.name, &labels)
                        .increment(len as u64);
                    metrics::histogram!(metric_defs::LINK_TX_LATENCY.name, &labels)
                        .record(started.elapsed().as_micros() as f64);
                }
                Err(err) => {
                    log::warn!("[{}] send of {} bytes failed: {}", device, len, err);
                    metrics::counter!(metric_defs::LINK_TX_FAILURES.name, &labels).increment(1);
                }
            }

            if let Some(on_done) = on_done {
                on_done(clone_outcome(&result));
            }
            result
        })
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    /// Feeds bytes received from the device and returns the complete frames.
    ///
    /// Uses the frame extractor when one is set, footer splitting when the
    /// reader has a footer, header framing otherwise.
    pub fn deliver(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        metrics::counter!(metric_defs::LINK_RX_BYTES.name, &self.labels.to_labels())
            .increment(chunk.len() as u64);

        if let Some(extract) = &self.extractor {
            let mut frames = Vec::new();
            let mut next = extract(&mut self.reader, chunk);
            while let Some(frame) = next {
                frames.push(frame);
                next = extract(&mut self.reader, &[]);
            }
            frames
        } else if self.reader.footer().is_some() {
            self.reader.read_by_header_and_footer(chunk).unwrap_or_default()
        } else {
            self.reader.read(chunk).into_iter().collect()
        }
    }

    /// Drops queued sends and buffered inbound bytes.
    ///
    /// A send already in flight still completes.
    pub fn disconnect(&mut self) {
        log::debug!(
            "[{}] disconnect: dropping {} queued entries, {} buffered bytes",
            self.labels.device,
            self.queue.len(robolink_stack::DEFAULT_GROUP),
            self.reader.pending_len()
        );
        self.queue.clear();
        self.reader.clear();
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for DeviceLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("transport", &self.transport)
            .field("queue", &self.queue)
            .field("reader", &self.reader)
            .field("extractor", &self.extractor.is_some())
            .field("labels", &self.labels)
            .finish()
    }
}

/// Copies a transport outcome for the caller while the original goes to the
/// queue for logging.
fn clone_outcome(result: &Result<(), TransportError>) -> LinkResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => Err(LinkError::Transport(match err {
            TransportError::NotConnected => TransportError::NotConnected,
            TransportError::UnknownRoute(route) => TransportError::UnknownRoute(route.clone()),
            TransportError::Write(msg) => TransportError::Write(msg.clone()),
            TransportError::Io(io) => {
                TransportError::Io(std::io::Error::new(io.kind(), io.to_string()))
            }
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_clone_outcome() {
        assert!(clone_outcome(&Ok(())).is_ok());

        let io = TransportError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        match clone_outcome(&Err(io)) {
            Err(LinkError::Transport(TransportError::Io(err))) => {
                assert_eq!(err.kind(), std::io::ErrorKind::TimedOut)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deliver_header_mode() {
        let reader = StreamReader::new()
            .with_header(&[0xFF, 0x55])
            .with_minimum_size(4);
        let mut link = DeviceLink::new(MemoryTransport::new(), reader);

        assert!(link.deliver(&[0xFF, 0x55, 0x02]).is_empty());
        assert_eq!(
            link.deliver(&[0x10, 0x20]),
            vec![vec![0xFF, 0x55, 0x02, 0x10, 0x20]]
        );
    }

    #[tokio::test]
    async fn test_deliver_splits_coalesced_length_delimited_frames() {
        let reader = StreamReader::new().with_header(&[0xA5]).with_minimum_size(2);
        let mut link = DeviceLink::new(MemoryTransport::new(), reader)
            .with_frame_len(|frame| frame.get(1).map(|len| usize::from(*len) + 2));

        assert_eq!(
            link.deliver(&[0xA5, 0x01, 0x10, 0xA5, 0x02, 0x20, 0x21, 0xA5]),
            vec![vec![0xA5, 0x01, 0x10], vec![0xA5, 0x02, 0x20, 0x21]]
        );
        assert_eq!(link.reader().pending(), &[0xA5]);
        assert_eq!(link.deliver(&[0x00]), vec![vec![0xA5, 0x00]]);
        assert_eq!(link.reader().frames(), 3);
    }

    #[tokio::test]
    async fn test_deliver_footer_mode() {
        let reader = StreamReader::new()
            .with_header(&[0xFF, 0x55])
            .with_footer(&[0x0D, 0x0A])
            .with_minimum_size(4);
        let mut link = DeviceLink::new(MemoryTransport::new(), reader);

        assert!(link.deliver(&[0xFF, 0x55, 0x01]).is_empty());
        assert_eq!(
            link.deliver(&[0x02, 0x0D, 0x0A]),
            vec![vec![0xFF, 0x55, 0x01, 0x02]]
        );
    }

    #[tokio::test]
    async fn test_disconnect_clears_reader() {
        let reader = StreamReader::new().with_header(&[0xFF, 0x55]).with_minimum_size(4);
        let mut link = DeviceLink::new(MemoryTransport::new(), reader);

        link.deliver(&[0xFF, 0x55]);
        assert_eq!(link.reader().pending_len(), 2);
        link.disconnect();
        assert_eq!(link.reader().pending_len(), 0);
    }
}
