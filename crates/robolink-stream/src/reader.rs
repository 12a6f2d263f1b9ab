//! Frame synchronizer for chunked inbound byte streams.
//!
//! The radio link delivers bytes in arbitrary slices: a frame may be split
//! over several deliveries, several frames may share one delivery, and noise
//! may precede a frame. [`StreamReader`] keeps the unconsumed tail between
//! calls and hands out complete frames once they pass the configured checks.
//!
//! ```text
//! pending ++ chunk
//!     │
//!     ├─ locate header ──── none ─────────────► keep everything, no frame
//!     │   (drop bytes before it)
//!     ├─ len < minimum_size ──────────────────► keep candidate, no frame
//!     ├─ checksum(candidate) fails ───────────► keep candidate, no frame
//!     └─ frame
//! ```
//!
//! Nothing here returns an error. Absence of a frame means "wait for more
//! bytes"; garbage before a header is discarded and never retried.

use bytes::{Buf, BytesMut};
use robolink_bytes::tools;
use robolink_metrics::metric_defs;

use crate::config::ReaderConfig;

/// Frame integrity check supplied by a device protocol.
pub type ChecksumFn = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Extracts validated frames from a chunked byte stream.
///
/// One reader belongs to one connection; call [`StreamReader::clear`] on
/// disconnect.
#[derive(Default)]
pub struct StreamReader {
    headers: Vec<Vec<u8>>,
    footer: Option<Vec<u8>>,
    minimum_size: usize,
    checksum: Option<ChecksumFn>,
    max_pending: Option<usize>,
    pending: BytesMut,
    frames: u64,
}

impl StreamReader {
    /// Creates a reader that treats every delivery as a frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reader from a configuration.
    pub fn from_config(config: &ReaderConfig) -> Self {
        StreamReader {
            headers: config
                .headers
                .iter()
                .filter(|h| !h.0.is_empty())
                .map(|h| h.0.clone())
                .collect(),
            footer: config
                .footer
                .as_ref()
                .filter(|f| !f.0.is_empty())
                .map(|f| f.0.clone()),
            minimum_size: config.minimum_size,
            checksum: None,
            max_pending: config.max_pending,
            pending: BytesMut::new(),
            frames: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Sets a single frame header.
    pub fn with_header(self, header: &[u8]) -> Self {
        self.with_headers(&[header])
    }

    /// Sets alternative frame headers; any of them may open a frame.
    pub fn with_headers(mut self, headers: &[&[u8]]) -> Self {
        self.headers = headers
            .iter()
            .filter(|h| !h.is_empty())
            .map(|h| h.to_vec())
            .collect();
        self
    }

    /// Sets the sequence that closes a frame.
    pub fn with_footer(mut self, footer: &[u8]) -> Self {
        self.footer = if footer.is_empty() {
            None
        } else {
            Some(footer.to_vec())
        };
        self
    }

    /// Sets the smallest admissible frame length.
    pub fn with_minimum_size(mut self, size: usize) -> Self {
        self.minimum_size = size;
        self
    }

    /// Sets the checksum predicate applied to every candidate frame.
    pub fn with_checksum<F>(mut self, checksum: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.checksum = Some(Box::new(checksum));
        self
    }

    /// Caps the bytes kept between reads; the oldest bytes are dropped first.
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = Some(max);
        self
    }

    /// Configured headers.
    pub fn headers(&self) -> &[Vec<u8>] {
        &self.headers
    }

    /// Configured footer.
    pub fn footer(&self) -> Option<&[u8]> {
        self.footer.as_deref()
    }

    /// Configured minimum frame size.
    pub fn minimum_size(&self) -> usize {
        self.minimum_size
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Feeds a chunk and returns a complete frame if one is available.
    ///
    /// The frame runs from the header to the end of the buffered data; callers
    /// of length-delimited protocols trim it with
    /// [`StreamReader::read_length_delimited`]. Passing an empty chunk
    /// re-examines the buffered bytes.
    pub fn read(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        let frame = self.candidate(chunk)?;
        self.count_frames(1);
        Some(frame)
    }

    /// Alias of [`StreamReader::read`].
    pub fn read_by_header(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.read(chunk)
    }

    /// Runs the header, size and checksum checks and takes the buffered bytes
    /// as one candidate. Counting is left to the public entry points.
    fn candidate(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        if !self.headers.is_empty() {
            match self.header_offset() {
                Some(0) => {}
                Some(offset) => {
                    log::debug!("discarding {} bytes before frame header", offset);
                    metrics::counter!(metric_defs::STREAM_DROPPED_BYTES.name)
                        .increment(offset as u64);
                    self.pending.advance(offset);
                }
                None => return self.hold(),
            }
        }

        if self.pending.is_empty() || self.pending.len() < self.minimum_size {
            return self.hold();
        }

        if let Some(checksum) = &self.checksum {
            if !checksum(&self.pending) {
                log::trace!(
                    "checksum rejected {} byte candidate, waiting for more data",
                    self.pending.len()
                );
                metrics::counter!(metric_defs::STREAM_CHECKSUM_REJECTS.name).increment(1);
                return self.hold();
            }
        }

        let frame = self.pending.split().to_vec();
        metrics::gauge!(metric_defs::STREAM_PENDING_BYTES.name).set(0.0);
        Some(frame)
    }

    /// Feeds a chunk and splits the result on every footer occurrence.
    ///
    /// Each footer closes one frame; the returned frames exclude the footer.
    /// Fragments shorter than the minimum size are dropped. Bytes after the
    /// last footer are kept as the start of the next frame. Returns `None`
    /// when no footer has arrived yet.
    ///
    /// Without a configured footer this behaves like [`StreamReader::read`].
    pub fn read_by_header_and_footer(&mut self, chunk: &[u8]) -> Option<Vec<Vec<u8>>> {
        let candidate = self.candidate(chunk)?;
        let footer = match &self.footer {
            Some(footer) => footer.clone(),
            None => {
                self.count_frames(1);
                return Some(vec![candidate]);
            }
        };

        let Some(positions) = tools::byte_positions(&candidate, &footer) else {
            self.add_buffer(&candidate);
            return None;
        };

        let mut frames = Vec::with_capacity(positions.len());
        let mut start = 0;
        for position in positions {
            // Overlapping footer matches
            if position < start {
                continue;
            }
            let fragment = &candidate[start..position];
            if fragment.len() >= self.minimum_size {
                frames.push(fragment.to_vec());
            } else {
                log::trace!("dropping {} byte fragment below minimum size", fragment.len());
            }
            start = position + footer.len();
        }

        if start < candidate.len() {
            self.add_buffer(&candidate[start..]);
        }
        self.count_frames(frames.len());
        Some(frames)
    }

    /// Feeds a chunk and trims the frame to the length its header declares.
    ///
    /// `frame_len` inspects a candidate and returns its full declared length,
    /// or `None` if the candidate is too short to tell. A short candidate is
    /// kept for the next call; bytes beyond the declared length are kept as
    /// the start of the next frame.
    pub fn read_length_delimited<F>(&mut self, chunk: &[u8], frame_len: F) -> Option<Vec<u8>>
    where
        F: Fn(&[u8]) -> Option<usize>,
    {
        let mut frame = self.candidate(chunk)?;
        let expected = match frame_len(&frame) {
            Some(len) => len.max(1),
            None => {
                self.add_buffer(&frame);
                return None;
            }
        };

        if frame.len() < expected {
            self.add_buffer(&frame);
            return None;
        }
        if frame.len() > expected {
            self.add_buffer(&frame[expected..]);
            frame.truncate(expected);
        }
        self.count_frames(1);
        Some(frame)
    }

    /// Like [`StreamReader::read_length_delimited`], but keeps extracting
    /// until the buffered bytes hold no further complete frame.
    pub fn read_all_length_delimited<F>(&mut self, chunk: &[u8], frame_len: F) -> Vec<Vec<u8>>
    where
        F: Fn(&[u8]) -> Option<usize>,
    {
        let mut frames = Vec::new();
        let mut next = self.read_length_delimited(chunk, &frame_len);
        while let Some(frame) = next {
            frames.push(frame);
            if self.pending.is_empty() {
                break;
            }
            next = self.read_length_delimited(&[], &frame_len);
        }
        frames
    }

    /// Appends bytes to the buffer kept for the next read.
    pub fn add_buffer(&mut self, partial: &[u8]) {
        self.pending.extend_from_slice(partial);
        self.enforce_cap();
        metrics::gauge!(metric_defs::STREAM_PENDING_BYTES.name).set(self.pending.len() as f64);
    }

    /// Drops up to `len` bytes from the front of the buffer and returns how
    /// many were dropped.
    ///
    /// For protocol layers that recognise a complete but corrupt frame, which
    /// the reader itself keeps.
    pub fn discard(&mut self, len: usize) -> usize {
        let len = len.min(self.pending.len());
        if len > 0 {
            metrics::counter!(metric_defs::STREAM_DROPPED_BYTES.name).increment(len as u64);
            self.pending.advance(len);
            metrics::gauge!(metric_defs::STREAM_PENDING_BYTES.name)
                .set(self.pending.len() as f64);
        }
        len
    }

    /// Frames handed out since the reader was created.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Bytes currently kept for the next read.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Number of bytes kept for the next read.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
        metrics::gauge!(metric_defs::STREAM_PENDING_BYTES.name).set(0.0);
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Offset of the earliest configured header in the pending bytes.
    fn header_offset(&self) -> Option<usize> {
        if self.headers.iter().any(|h| self.pending.starts_with(h)) {
            return Some(0);
        }
        self.headers
            .iter()
            .filter_map(|h| tools::first_position(&self.pending, h))
            .min()
    }

    fn count_frames(&mut self, count: usize) {
        if count > 0 {
            self.frames += count as u64;
            metrics::counter!(metric_defs::STREAM_FRAMES.name).increment(count as u64);
        }
    }

    fn hold(&mut self) -> Option<Vec<u8>> {
        self.enforce_cap();
        metrics::gauge!(metric_defs::STREAM_PENDING_BYTES.name).set(self.pending.len() as f64);
        None
    }

    fn enforce_cap(&mut self) {
        let Some(max) = self.max_pending else {
            return;
        };
        if self.pending.len() > max {
            let excess = self.pending.len() - max;
            log::debug!("pending buffer over {} bytes, dropping {} oldest", max, excess);
            metrics::counter!(metric_defs::STREAM_DROPPED_BYTES.name).increment(excess as u64);
            self.pending.advance(excess);
        }
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("headers", &self.headers)
            .field("footer", &self.footer)
            .field("minimum_size", &self.minimum_size)
            .field("checksum", &self.checksum.is_some())
            .field("max_pending", &self.max_pending)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ByteSeq;

    fn mbot_reader() -> StreamReader {
        StreamReader::new()
            .with_header(&[0xFF, 0x55])
            .with_footer(&[0x0D, 0x0A])
            .with_minimum_size(4)
    }

    #[test]
    fn test_no_headers_passes_through() {
        let mut reader = StreamReader::new();
        assert_eq!(reader.read(&[1, 2, 3]), Some(vec![1, 2, 3]));
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_empty_chunk_is_not_a_frame() {
        let mut reader = StreamReader::new();
        assert_eq!(reader.read(&[]), None);
    }

    #[test]
    fn test_below_minimum_size_then_complete() {
        let mut reader = StreamReader::new()
            .with_header(&[0xFF, 0x55])
            .with_minimum_size(4);

        assert_eq!(reader.read(&[0xFF, 0x55, 0x02]), None);
        assert_eq!(reader.pending(), &[0xFF, 0x55, 0x02]);
        assert_eq!(
            reader.read(&[0x10, 0x20]),
            Some(vec![0xFF, 0x55, 0x02, 0x10, 0x20])
        );
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_garbage_before_header_is_dropped() {
        let mut reader = StreamReader::new().with_header(&[0xFF, 0x55]);
        assert_eq!(
            reader.read(&[0x01, 0x02, 0xFF, 0x55, 0x09]),
            Some(vec![0xFF, 0x55, 0x09])
        );
    }

    #[test]
    fn test_no_header_keeps_everything() {
        let mut reader = StreamReader::new().with_header(&[0xFF, 0x55]);
        assert_eq!(reader.read(&[0x01, 0x02, 0xFF]), None);
        assert_eq!(reader.pending(), &[0x01, 0x02, 0xFF]);

        // The split header completes across deliveries.
        assert_eq!(reader.read(&[0x55, 0x07]), Some(vec![0xFF, 0x55, 0x07]));
    }

    #[test]
    fn test_earliest_of_alternative_headers() {
        let mut reader = StreamReader::new().with_headers(&[&[0xFF, 0xFE], &[0xFF, 0xFF]]);
        let data = [0x00, 0xFF, 0xFF, 0x01, 0xFF, 0xFE, 0x02];
        assert_eq!(
            reader.read(&data),
            Some(vec![0xFF, 0xFF, 0x01, 0xFF, 0xFE, 0x02])
        );
    }

    #[test]
    fn test_checksum_failure_is_retained() {
        // Second byte declares the total length.
        let mut reader = StreamReader::new()
            .with_header(&[0xAA])
            .with_minimum_size(2)
            .with_checksum(|frame| frame.len() >= frame[1] as usize);

        assert_eq!(reader.read(&[0xAA, 0x04, 0x01]), None);
        assert_eq!(reader.pending_len(), 3);
        assert_eq!(reader.read(&[0x02]), Some(vec![0xAA, 0x04, 0x01, 0x02]));
        assert_eq!(reader.read(&[]), None);
    }

    #[test]
    fn test_add_buffer_prepends_to_next_read() {
        let mut reader = StreamReader::new().with_header(&[0xFF, 0x55]);
        reader.add_buffer(&[0xFF, 0x55]);
        assert_eq!(reader.read(&[0x01]), Some(vec![0xFF, 0x55, 0x01]));
    }

    #[test]
    fn test_footer_splits_frames() {
        let mut reader = mbot_reader();
        let data = [
            0xFF, 0x55, 0x01, 0x02, 0x03, 0x0D, 0x0A, // frame 1
            0xFF, 0x55, 0x0D, 0x0A, // bare acknowledgement
            0xFF, 0x55, 0x04, 0x05, 0x0D, 0x0A, // frame 2
            0xFF, 0x55, 0x06, // start of frame 3
        ];

        let frames = reader.read_by_header_and_footer(&data).unwrap();
        assert_eq!(
            frames,
            vec![
                vec![0xFF, 0x55, 0x01, 0x02, 0x03],
                vec![0xFF, 0x55, 0x04, 0x05],
            ]
        );
        assert_eq!(reader.pending(), &[0xFF, 0x55, 0x06]);

        let frames = reader.read_by_header_and_footer(&[0x07, 0x0D, 0x0A]).unwrap();
        assert_eq!(frames, vec![vec![0xFF, 0x55, 0x06, 0x07]]);
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_footer_missing_keeps_candidate() {
        let mut reader = mbot_reader();
        assert_eq!(reader.read_by_header_and_footer(&[0xFF, 0x55, 0x01, 0x02]), None);
        assert_eq!(reader.pending(), &[0xFF, 0x55, 0x01, 0x02]);
        assert_eq!(
            reader.read_by_header_and_footer(&[0x0D, 0x0A]),
            Some(vec![vec![0xFF, 0x55, 0x01, 0x02]])
        );
    }

    #[test]
    fn test_footer_mode_without_footer() {
        let mut reader = StreamReader::new().with_header(&[0x01]);
        assert_eq!(
            reader.read_by_header_and_footer(&[0x01, 0x02]),
            Some(vec![vec![0x01, 0x02]])
        );
    }

    #[test]
    fn test_length_delimited_short_and_long() {
        // Header, length byte, payload.
        let frame_len = |frame: &[u8]| frame.get(1).map(|len| *len as usize + 2);
        let mut reader = StreamReader::new().with_header(&[0xA5]).with_minimum_size(2);

        assert_eq!(reader.read_length_delimited(&[0xA5, 0x03, 0x01], frame_len), None);
        assert_eq!(reader.pending_len(), 3);

        let frame = reader.read_length_delimited(&[0x02, 0x03, 0xA5, 0x01], frame_len);
        assert_eq!(frame, Some(vec![0xA5, 0x03, 0x01, 0x02, 0x03]));
        assert_eq!(reader.pending(), &[0xA5, 0x01]);

        assert_eq!(
            reader.read_length_delimited(&[0x09], frame_len),
            Some(vec![0xA5, 0x01, 0x09])
        );
    }

    #[test]
    fn test_short_length_delimited_candidate_is_not_counted() {
        let frame_len = |frame: &[u8]| frame.get(1).map(|len| *len as usize + 2);
        let mut reader = StreamReader::new().with_header(&[0xA5]).with_minimum_size(2);

        assert_eq!(reader.read_length_delimited(&[0xA5, 0x03], frame_len), None);
        assert_eq!(reader.read_length_delimited(&[0x01, 0x02], frame_len), None);
        assert_eq!(reader.frames(), 0);

        assert!(reader.read_length_delimited(&[0x03], frame_len).is_some());
        assert_eq!(reader.frames(), 1);
    }

    #[test]
    fn test_footer_frames_are_counted_once_each() {
        let mut reader = mbot_reader();
        reader.read_by_header_and_footer(&[0xFF, 0x55, 0x01, 0x02]);
        assert_eq!(reader.frames(), 0);

        let data = [0x0D, 0x0A, 0xFF, 0x55, 0x0D, 0x0A, 0xFF, 0x55, 0x03, 0x04, 0x0D, 0x0A];
        assert_eq!(reader.read_by_header_and_footer(&data).map(|f| f.len()), Some(2));
        assert_eq!(reader.frames(), 2);
    }

    #[test]
    fn test_discard() {
        let mut reader = StreamReader::new().with_header(&[0xFF]).with_minimum_size(4);
        reader.read(&[0xFF, 0x01, 0x02]);
        assert_eq!(reader.discard(2), 2);
        assert_eq!(reader.pending(), &[0x02]);
        assert_eq!(reader.discard(10), 1);
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_read_all_length_delimited() {
        let frame_len = |frame: &[u8]| frame.get(1).map(|len| *len as usize + 2);
        let mut reader = StreamReader::new().with_header(&[0xA5]).with_minimum_size(2);

        let frames = reader.read_all_length_delimited(
            &[0xA5, 0x01, 0x10, 0xA5, 0x02, 0x20, 0x21, 0xA5, 0x03],
            frame_len,
        );
        assert_eq!(
            frames,
            vec![vec![0xA5, 0x01, 0x10], vec![0xA5, 0x02, 0x20, 0x21]]
        );
        assert_eq!(reader.pending(), &[0xA5, 0x03]);
    }

    #[test]
    fn test_max_pending_keeps_newest_bytes() {
        let mut reader = StreamReader::new()
            .with_header(&[0xFF, 0x55])
            .with_max_pending(4);

        assert_eq!(reader.read(&[1, 2, 3, 4, 5, 6, 0xFF]), None);
        assert_eq!(reader.pending(), &[4, 5, 6, 0xFF]);
        assert_eq!(reader.read(&[0x55, 0x01]), Some(vec![0xFF, 0x55, 0x01]));
    }

    #[test]
    fn test_clear() {
        let mut reader = StreamReader::new().with_header(&[0xFF]);
        reader.read(&[0x01, 0x02]);
        assert_eq!(reader.pending_len(), 2);
        reader.clear();
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = ReaderConfig {
            headers: vec![ByteSeq(vec![0xFF, 0x55])],
            footer: Some(ByteSeq(vec![0x0D, 0x0A])),
            minimum_size: 4,
            max_pending: None,
        };
        let reader = StreamReader::from_config(&config);
        assert_eq!(reader.headers(), &[vec![0xFF, 0x55]]);
        assert_eq!(reader.footer(), Some(&[0x0D, 0x0A][..]));
        assert_eq!(reader.minimum_size(), 4);
    }

    #[test]
    fn test_empty_header_is_ignored() {
        let reader = StreamReader::new().with_headers(&[&[]]).with_footer(&[]);
        assert!(reader.headers().is_empty());
        assert_eq!(reader.footer(), None);
    }
}
