//! Sphero 2.0.
//!
//! Big-endian payloads inside a checksummed, length-delimited envelope:
//!
//! ```text
//! request   FF  FF|FE  DID  CID  SEQ  DLEN  payload..  CHK
//! response  FF  FF     MRSP SEQ  DLEN  data..  CHK        (acknowledgement)
//!           FF  FE     ID   DLEN_HI DLEN_LO data..  CHK   (asynchronous)
//! ```
//!
//! `DLEN` counts the payload plus the checksum byte; asynchronous messages
//! carry it as a big-endian 16-bit value. `CHK` is the bitwise
//! inverse of the low byte of the sum of every byte after the two sync bytes.
//! A request asks for an answer (`FF`) when its sequence byte is non-zero.

use std::ops::{Deref, DerefMut};

use robolink_bytes::MsbBuffer;
use robolink_stream::StreamReader;

use crate::error::{DeviceError, DeviceResult};

/// Headers that may open a response.
pub const HEADERS: [[u8; 2]; 2] = [[0xFF, 0xFF], [0xFF, 0xFE]];

/// Smallest complete response: sync, two fields, length, one data byte, checksum.
pub const MINIMUM_SIZE: usize = 7;

/// Bytes the preset reader keeps while waiting for a complete response.
pub const MAX_PENDING: usize = 1024;

/// Sequence numbers used to match answers to requests.
pub mod callback {
    pub const NONE: u8 = 0x00;
    pub const LOCATION: u8 = 0x10;
    pub const RGB: u8 = 0x15;
    pub const VERSION: u8 = 0x20;
    pub const UNKNOWN: u8 = 0xF0;
}

/// Device id and command id pairs.
pub mod command {
    pub const PING: (u8, u8) = (0x00, 0x01);
    pub const VERSION: (u8, u8) = (0x00, 0x02);
    pub const POWER_STATE: (u8, u8) = (0x00, 0x20);
    pub const SLEEP: (u8, u8) = (0x00, 0x22);
    pub const HEADING: (u8, u8) = (0x02, 0x01);
    pub const DATA_STREAMING: (u8, u8) = (0x02, 0x11);
    pub const COLLISION_DETECTION: (u8, u8) = (0x02, 0x12);
    pub const SET_LOCATION: (u8, u8) = (0x02, 0x13);
    pub const GET_LOCATION: (u8, u8) = (0x02, 0x15);
    pub const SET_RGB_LED: (u8, u8) = (0x02, 0x20);
    pub const BACK_LED: (u8, u8) = (0x02, 0x21);
    pub const GET_RGB_LED: (u8, u8) = (0x02, 0x22);
    pub const ROLL: (u8, u8) = (0x02, 0x30);
    pub const BOOST: (u8, u8) = (0x02, 0x31);
    pub const MOVE: (u8, u8) = (0x02, 0x32);
    pub const POWER: (u8, u8) = (0x02, 0x33);
    pub const MOTION_TIMEOUT: (u8, u8) = (0x02, 0x34);
}

/// Second sync byte of a response.
pub mod response_type {
    pub const ACKNOWLEDGEMENT: u8 = 0xFF;
    pub const ASYNCHRONOUS: u8 = 0xFE;
}

/// Id codes of asynchronous messages.
pub mod message_type {
    pub const PRE_SLEEP: u8 = 0x05;
    pub const COLLISION_DETECTED: u8 = 0x07;
}

/// Builder for one Sphero request.
#[derive(Debug, Clone)]
pub struct SpheroBuffer {
    payload: MsbBuffer,
    command: (u8, u8),
    callback: u8,
}

impl Default for SpheroBuffer {
    fn default() -> Self {
        SpheroBuffer {
            payload: MsbBuffer::new(),
            command: command::PING,
            callback: callback::NONE,
        }
    }
}

impl SpheroBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the device id and command id.
    pub fn set_command(&mut self, command: (u8, u8)) -> &mut Self {
        self.command = command;
        self
    }

    /// Sets the sequence byte. Non-zero requests an answer.
    pub fn set_callback(&mut self, callback: u8) -> &mut Self {
        self.callback = callback;
        self
    }

    pub fn command(&self) -> (u8, u8) {
        self.command
    }

    pub fn callback(&self) -> u8 {
        self.callback
    }

    /// Wraps the payload in the request envelope and appends the checksum.
    pub fn signed(&self) -> MsbBuffer {
        let payload = self.payload.as_slice();
        let (did, cid) = self.command;
        let answer = if self.callback != callback::NONE { 0xFF } else { 0xFE };

        let mut frame = MsbBuffer::new();
        frame
            .write(0xFF)
            .write(answer)
            .write(did)
            .write(cid)
            .write(self.callback)
            .write((payload.len() + 1) as u8)
            .write_all(payload);
        let chk = checksum(&frame.as_slice()[2..]);
        frame.write(chk);

        if let Some(tag) = self.payload.routing_tag() {
            frame.set_routing_tag(tag);
        }
        frame
    }
}

impl Deref for SpheroBuffer {
    type Target = MsbBuffer;

    fn deref(&self) -> &MsbBuffer {
        &self.payload
    }
}

impl DerefMut for SpheroBuffer {
    fn deref_mut(&mut self) -> &mut MsbBuffer {
        &mut self.payload
    }
}

impl From<SpheroBuffer> for MsbBuffer {
    fn from(buffer: SpheroBuffer) -> Self {
        buffer.signed()
    }
}

/// Inverted low byte of the sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

fn request(command: (u8, u8)) -> SpheroBuffer {
    let mut buffer = SpheroBuffer::new();
    buffer.set_command(command);
    buffer
}

fn query(command: (u8, u8), callback: u8) -> SpheroBuffer {
    let mut buffer = request(command);
    buffer.set_callback(callback);
    buffer
}

// ============================================================================
// Requests
// ============================================================================

pub fn ping() -> SpheroBuffer {
    request(command::PING)
}

/// Requests the firmware versions.
pub fn get_version() -> SpheroBuffer {
    query(command::VERSION, callback::VERSION)
}

/// Sets the main LED colour, optionally as the power-on default.
pub fn set_rgb(red: u8, green: u8, blue: u8, persistent: bool) -> SpheroBuffer {
    let mut buffer = request(command::SET_RGB_LED);
    buffer
        .write_byte(red)
        .write_byte(green)
        .write_byte(blue)
        .write_byte(u8::from(persistent));
    buffer
}

pub fn get_rgb() -> SpheroBuffer {
    query(command::GET_RGB_LED, callback::RGB)
}

/// Sets the brightness of the tail light used for aiming.
pub fn set_back_led(brightness: u8) -> SpheroBuffer {
    let mut buffer = request(command::BACK_LED);
    buffer.write_byte(brightness);
    buffer
}

/// Makes `heading` (0-359) the new zero heading.
pub fn set_heading(heading: u16) -> SpheroBuffer {
    let mut buffer = request(command::HEADING);
    buffer.write_short(i32::from(heading));
    buffer
}

/// Rolls at `speed` towards `heading` (0-359). `enabled` false brakes.
pub fn roll(speed: u8, heading: u16, enabled: bool) -> SpheroBuffer {
    let mut buffer = request(command::ROLL);
    buffer
        .write_byte(speed)
        .write_short(i32::from(heading))
        .write_byte(u8::from(enabled));
    buffer
}

pub fn boost(enabled: bool) -> SpheroBuffer {
    let mut buffer = request(command::BOOST);
    buffer.write_byte(u8::from(enabled));
    buffer
}

/// Enables collision detection with the given thresholds; method 0 disables.
pub fn set_collision_detection(
    method: u8,
    threshold_x: u8,
    threshold_y: u8,
    speed_x: u8,
    speed_y: u8,
    interval: u8,
) -> SpheroBuffer {
    let mut buffer = request(command::COLLISION_DETECTION);
    buffer
        .write_byte(method)
        .write_byte(threshold_x)
        .write_byte(threshold_y)
        .write_byte(speed_x)
        .write_byte(speed_y)
        .write_byte(interval);
    buffer
}

/// Sets the drive timeout in milliseconds.
pub fn set_motion_timeout(timeout: u8) -> SpheroBuffer {
    let mut buffer = request(command::MOTION_TIMEOUT);
    buffer.write_byte(timeout);
    buffer
}

pub fn get_location() -> SpheroBuffer {
    query(command::GET_LOCATION, callback::LOCATION)
}

pub fn sleep(wakeup: u8, macro_id: u8, orb_basic: u8) -> SpheroBuffer {
    let mut buffer = request(command::SLEEP);
    buffer
        .write_byte(wakeup)
        .write_byte(macro_id)
        .write_byte(orb_basic);
    buffer
}

// ============================================================================
// Responses
// ============================================================================

/// Frame reader for Sphero responses with checksum validation.
///
/// Candidates run to the end of the buffered bytes; trim them with
/// [`extract_packet`].
pub fn reader() -> StreamReader {
    StreamReader::new()
        .with_headers(&[&HEADERS[0], &HEADERS[1]])
        .with_minimum_size(MINIMUM_SIZE)
        .with_checksum(verify_checksum)
        .with_max_pending(MAX_PENDING)
}

/// `DLEN` of the response starting at `frame[0]`, once its header is in.
fn data_len(frame: &[u8]) -> Option<usize> {
    if frame.len() < 5 {
        return None;
    }
    match frame[1] {
        response_type::ASYNCHRONOUS => Some(usize::from(u16::from_be_bytes([frame[3], frame[4]]))),
        _ => Some(usize::from(frame[4])),
    }
}

/// Full length of the response starting at `frame[0]`, once known.
pub fn packet_len(frame: &[u8]) -> Option<usize> {
    data_len(frame).map(|len| len + 5)
}

/// Checks the response checksum. False while the frame is still incomplete.
pub fn verify_checksum(frame: &[u8]) -> bool {
    if frame.len() < 6 || frame[0] != 0xFF {
        return false;
    }
    let Some(end) = data_len(frame).map(|len| len + 4) else {
        return false;
    };
    match frame.get(end) {
        Some(chk) => checksum(&frame[2..end]) == *chk,
        None => false,
    }
}

/// Feeds a chunk and returns one response trimmed to its declared length.
///
/// A short candidate stays buffered; bytes past the declared length stay
/// buffered as the start of the next response. A response that is complete
/// but fails its checksum is dropped so the ones behind it get through.
pub fn extract_packet(reader: &mut StreamReader, chunk: &[u8]) -> Option<Vec<u8>> {
    let mut packet = reader.read_length_delimited(chunk, packet_len);
    while packet.is_none() && discard_corrupt(reader) {
        packet = reader.read_length_delimited(&[], packet_len);
    }
    packet
}

/// Drops the buffered response at the front if it is complete but corrupt.
fn discard_corrupt(reader: &mut StreamReader) -> bool {
    let pending = reader.pending();
    if !HEADERS.iter().any(|header| pending.starts_with(header)) {
        return false;
    }
    match packet_len(pending) {
        Some(len) if pending.len() >= len && !verify_checksum(pending) => {
            log::debug!("dropping {} byte sphero response with bad checksum", len);
            reader.discard(len);
            true
        }
        _ => false,
    }
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Answer to a request; `seq` is the request's sequence byte.
    Ack { code: u8, seq: u8, data: Vec<u8> },
    /// Unsolicited message such as a collision report.
    Async { id_code: u8, data: Vec<u8> },
}

impl Response {
    pub fn data(&self) -> &[u8] {
        match self {
            Response::Ack { data, .. } | Response::Async { data, .. } => data,
        }
    }
}

/// Decodes a complete response frame.
pub fn parse_response(frame: &[u8]) -> DeviceResult<Response> {
    DeviceError::require(frame, 6)?;
    if frame[0] != 0xFF {
        return Err(DeviceError::BadHeader(frame[..2].to_vec()));
    }

    let len = data_len(frame).unwrap_or_default();
    DeviceError::require(frame, len + 5)?;
    let end = len + 4;
    let expected = checksum(&frame[2..end]);
    if expected != frame[end] {
        return Err(DeviceError::Checksum {
            expected,
            actual: frame[end],
        });
    }

    let data = frame.get(5..end).map(<[u8]>::to_vec).unwrap_or_default();
    match frame[1] {
        response_type::ACKNOWLEDGEMENT => Ok(Response::Ack {
            code: frame[2],
            seq: frame[3],
            data,
        }),
        response_type::ASYNCHRONOUS => {
            if frame[2] == message_type::PRE_SLEEP {
                log::warn!("sphero will sleep in 10 seconds");
            }
            Ok(Response::Async {
                id_code: frame[2],
                data,
            })
        }
        _ => Err(DeviceError::BadHeader(frame[..2].to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an acknowledgement with a valid checksum.
    fn response(code: u8, seq: u8, data: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xFF, 0xFF, code, seq, (data.len() + 1) as u8];
        frame.extend_from_slice(data);
        frame.push(checksum(&frame[2..]));
        frame
    }

    /// Builds an asynchronous message with a valid checksum.
    fn message(id_code: u8, data: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xFF, 0xFE, id_code];
        frame.extend_from_slice(&((data.len() + 1) as u16).to_be_bytes());
        frame.extend_from_slice(data);
        frame.push(checksum(&frame[2..]));
        frame
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0xFF);
        assert_eq!(checksum(&[0x02, 0x20, 0x00, 0x05]), !0x27);
        // Sum wraps at 8 bits.
        assert_eq!(checksum(&[0xFF, 0x02]), !0x01);
    }

    #[test]
    fn test_ping_envelope() {
        assert_eq!(
            ping().signed().as_slice(),
            &[0xFF, 0xFE, 0x00, 0x01, 0x00, 0x01, 0xFD]
        );
    }

    #[test]
    fn test_set_rgb_envelope() {
        let frame = set_rgb(0xFF, 0x00, 0x80, false).signed();
        let sum = 0x02u8
            .wrapping_add(0x20)
            .wrapping_add(0x00)
            .wrapping_add(0x05)
            .wrapping_add(0xFF)
            .wrapping_add(0x00)
            .wrapping_add(0x80)
            .wrapping_add(0x00);
        assert_eq!(
            frame.as_slice(),
            &[0xFF, 0xFE, 0x02, 0x20, 0x00, 0x05, 0xFF, 0x00, 0x80, 0x00, !sum]
        );
    }

    #[test]
    fn test_query_requests_answer() {
        let frame = get_version().signed();
        assert_eq!(&frame.as_slice()[..6], &[0xFF, 0xFF, 0x00, 0x02, 0x20, 0x01]);
    }

    #[test]
    fn test_roll_heading_is_big_endian() {
        let frame = roll(0x80, 270, true).signed();
        assert_eq!(&frame.as_slice()[6..10], &[0x80, 0x01, 0x0E, 0x01]);
        assert_eq!(frame.as_slice()[5], 5);
    }

    #[test]
    fn test_routing_tag_survives_signing() {
        let mut buffer = set_heading(0);
        buffer.set_routing_tag("22bb746f-2ba1-7554-2d6f-726568705327");
        assert_eq!(
            buffer.signed().routing_tag(),
            Some("22bb746f-2ba1-7554-2d6f-726568705327")
        );
    }

    #[test]
    fn test_verify_checksum() {
        let frame = response(0x00, callback::RGB, &[0x10, 0x20, 0x30]);
        assert!(verify_checksum(&frame));
        assert!(!verify_checksum(&frame[..frame.len() - 1]));

        let mut corrupt = frame.clone();
        corrupt[5] ^= 0x01;
        assert!(!verify_checksum(&corrupt));
    }

    #[test]
    fn test_parse_ack() {
        let frame = response(0x00, callback::RGB, &[0x10, 0x20, 0x30]);
        assert_eq!(
            parse_response(&frame).unwrap(),
            Response::Ack {
                code: 0x00,
                seq: callback::RGB,
                data: vec![0x10, 0x20, 0x30],
            }
        );
    }

    #[test]
    fn test_parse_async_and_empty_data() {
        let frame = message(message_type::PRE_SLEEP, &[]);
        let parsed = parse_response(&frame).unwrap();
        assert_eq!(
            parsed,
            Response::Async {
                id_code: message_type::PRE_SLEEP,
                data: vec![],
            }
        );
        assert!(parsed.data().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        let mut frame = response(0x00, 0x01, &[0x01]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(
            parse_response(&frame),
            Err(DeviceError::Checksum { .. })
        ));
        assert!(matches!(
            parse_response(&[0xFF, 0xFF, 0x00, 0x01, 0x09, 0x00]),
            Err(DeviceError::TooShort { expected: 14, .. })
        ));
    }

    #[test]
    fn test_async_length_is_sixteen_bits() {
        let data: Vec<u8> = (0..300u16).map(|i| i as u8).collect();
        let frame = message(message_type::COLLISION_DETECTED, &data);
        assert_eq!(&frame[3..5], &[0x01, 0x2D]);
        assert_eq!(packet_len(&frame), Some(frame.len()));
        assert!(verify_checksum(&frame));

        match parse_response(&frame).unwrap() {
            Response::Async { id_code, data: parsed } => {
                assert_eq!(id_code, message_type::COLLISION_DETECTED);
                assert_eq!(parsed, data);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_response_does_not_stall_reader() {
        let mut corrupt = response(0x00, callback::RGB, &[0x10, 0x20, 0x30]);
        corrupt[5] ^= 0x01;
        let good = response(0x00, callback::VERSION, &[0x01]);

        let mut reader = reader();
        assert_eq!(extract_packet(&mut reader, &corrupt), None);

        let mut recovered = 0;
        for _ in 0..200 {
            let mut next = extract_packet(&mut reader, &good);
            while let Some(frame) = next {
                assert_eq!(frame, good);
                recovered += 1;
                next = extract_packet(&mut reader, &[]);
            }
        }
        assert_eq!(recovered, 200);
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_reader_pending_is_bounded() {
        let mut reader = reader();
        // A header followed by a declared length that never arrives.
        let mut stalled = vec![0xFF, 0xFE, message_type::COLLISION_DETECTED, 0xFF, 0xF0];
        stalled.extend(std::iter::repeat(0x00).take(2 * MAX_PENDING));
        assert_eq!(extract_packet(&mut reader, &stalled), None);
        assert!(reader.pending_len() <= MAX_PENDING);
    }
}
