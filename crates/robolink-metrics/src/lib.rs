//! Metrics infrastructure for the robolink protocol stack.
//!
//! Every metric emitted by the stream reader, the command stack and the device
//! link is declared here as a [`Metric`] constant, so names and units live in
//! one place. The crate re-exports `metrics`; no recorder is installed here,
//! which makes every emission a no-op until the application installs one.
//!
//! # Example
//!
//! ```rust,ignore
//! use robolink_metrics::{describe_metrics, metric_defs, LinkLabels};
//!
//! describe_metrics();
//!
//! let labels = LinkLabels::new("mbot-1", "mbot");
//! metrics::counter!(metric_defs::LINK_TX_FRAMES.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Which `metrics` macro family a declaration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Name, kind and documentation of one emitted metric.
///
/// ```rust
/// use robolink_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const FRAMES: Metric = Metric::counter("robolink.example.frames")
///     .with_description("Frames seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["device"]);
///
/// assert_eq!(FRAMES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted name under the `robolink.` prefix.
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys the emitting code attaches.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, text: &'static str) -> Self {
        self.description = text;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, keys: &'static [&'static str]) -> Self {
        self.labels = keys;
        self
    }

    /// Publishes the description and unit to the installed recorder.
    pub fn describe(&self) {
        let (name, text) = (self.name, self.description);
        match (self.kind, self.unit) {
            (MetricKind::Counter, None) => describe_counter!(name, text),
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, text),
            (MetricKind::Gauge, None) => describe_gauge!(name, text),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(name, unit, text),
            (MetricKind::Histogram, None) => describe_histogram!(name, text),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, text),
        }
    }
}

/// Every metric the robolink crates emit.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels attached by a device link.
    pub const LINK_LABELS: &[&str] = &["device", "protocol"];

    // ========================================================================
    // Stream Reader
    // ========================================================================

    /// Complete frames produced by a stream reader.
    pub const STREAM_FRAMES: Metric = Metric::counter("robolink.stream.frames")
        .with_description("Complete frames extracted from the inbound byte stream")
        .with_unit(Unit::Count);

    /// Leading bytes discarded while resynchronising on a header.
    pub const STREAM_DROPPED_BYTES: Metric = Metric::counter("robolink.stream.dropped_bytes")
        .with_description("Inbound bytes discarded before a frame header or by the pending cap")
        .with_unit(Unit::Bytes);

    /// Candidates held back because the checksum predicate rejected them.
    pub const STREAM_CHECKSUM_REJECTS: Metric = Metric::counter("robolink.stream.checksum_rejects")
        .with_description("Frame candidates retained after a failed checksum")
        .with_unit(Unit::Count);

    /// Bytes currently held for the next read.
    pub const STREAM_PENDING_BYTES: Metric = Metric::gauge("robolink.stream.pending_bytes")
        .with_description("Bytes retained between reads")
        .with_unit(Unit::Bytes);

    // ========================================================================
    // Command Stack
    // ========================================================================

    /// Entries added to any group.
    ///
    /// Labels: kind (command, delay, async)
    pub const STACK_ENTRIES: Metric = Metric::counter("robolink.stack.entries")
        .with_description("Stack entries enqueued")
        .with_unit(Unit::Count)
        .with_labels(&["kind"]);

    /// Asynchronous entries that resolved with an error.
    pub const STACK_ASYNC_FAILURES: Metric = Metric::counter("robolink.stack.async_failures")
        .with_description("Asynchronous stack entries that failed")
        .with_unit(Unit::Count);

    /// Entries waiting in the default group.
    pub const STACK_DEPTH: Metric = Metric::gauge("robolink.stack.depth")
        .with_description("Entries waiting in the default group")
        .with_unit(Unit::Count);

    // ========================================================================
    // Device Link
    // ========================================================================

    /// Frames handed to the transport.
    ///
    /// Labels: device, protocol
    pub const LINK_TX_FRAMES: Metric = Metric::counter("robolink.link.tx_frames")
        .with_description("Frames written to the transport")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// Bytes handed to the transport.
    ///
    /// Labels: device, protocol
    pub const LINK_TX_BYTES: Metric = Metric::counter("robolink.link.tx_bytes")
        .with_description("Bytes written to the transport")
        .with_unit(Unit::Bytes)
        .with_labels(LINK_LABELS);

    /// Transport writes that failed.
    ///
    /// Labels: device, protocol
    pub const LINK_TX_FAILURES: Metric = Metric::counter("robolink.link.tx_failures")
        .with_description("Transport writes that returned an error")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// Time a single transport write took.
    ///
    /// Labels: device, protocol
    pub const LINK_TX_LATENCY: Metric = Metric::histogram("robolink.link.tx_latency_us")
        .with_description("Transport write latency in microseconds")
        .with_unit(Unit::Microseconds)
        .with_labels(LINK_LABELS);

    /// Bytes delivered by the transport.
    ///
    /// Labels: device, protocol
    pub const LINK_RX_BYTES: Metric = Metric::counter("robolink.link.rx_bytes")
        .with_description("Bytes delivered by the transport")
        .with_unit(Unit::Bytes)
        .with_labels(LINK_LABELS);

    /// Every declaration above, for `describe_metrics()`.
    pub const ALL: &[&Metric] = &[
        &STREAM_FRAMES,
        &STREAM_DROPPED_BYTES,
        &STREAM_CHECKSUM_REJECTS,
        &STREAM_PENDING_BYTES,
        &STACK_ENTRIES,
        &STACK_ASYNC_FAILURES,
        &STACK_DEPTH,
        &LINK_TX_FRAMES,
        &LINK_TX_BYTES,
        &LINK_TX_FAILURES,
        &LINK_TX_LATENCY,
        &LINK_RX_BYTES,
    ];
}

/// Labels identifying one device link.
///
/// ```rust
/// use robolink_metrics::LinkLabels;
///
/// let labels = LinkLabels::new("sphero-7", "sphero2");
/// assert_eq!(labels.to_labels().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LinkLabels {
    /// Device name as known to the application.
    pub device: String,
    /// Protocol family (mbot, sphero2, wedo2, ...).
    pub protocol: String,
}

impl LinkLabels {
    /// Creates labels for a device speaking `protocol`.
    pub fn new(device: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            protocol: protocol.into(),
        }
    }

    /// Converts the labels to the `metrics` crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("device", self.device.clone()),
            ("protocol", self.protocol.clone()),
        ]
    }
}

/// Describes all metrics used by the stack.
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
