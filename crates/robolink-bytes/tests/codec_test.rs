//! Frames built with the public codec and read back with the byte tools.

use robolink_bytes::tools::{
    byte_positions, bytes_to_float32_le, bytes_to_int, first_position, signed_bytes_to_int,
    to_text,
};
use robolink_bytes::{BytesError, CommandTag, DataType, HeaderSpec, LsbBuffer, MsbBuffer};

/// Header table of a bytecode-style protocol where every field is tagged.
const TAGGED: HeaderSpec = HeaderSpec::new()
    .with(DataType::Byte, 0x81)
    .with(DataType::Short, 0x82)
    .with(DataType::Long, 0x83)
    .with(DataType::Str, 0x84);

#[test]
fn test_tagged_fields() {
    let mut buffer = LsbBuffer::with_headers(TAGGED);
    buffer
        .write_command(0xA4u8)
        .write_byte(0x00)
        .write_short(-100)
        .write_long(1000)
        .write_string("ok");

    assert_eq!(
        buffer.into_bytes(),
        vec![
            0xA4, // untagged opcode
            0x81, 0x00, //
            0x82, 0x9C, 0xFF, //
            0x83, 0xE8, 0x03, 0x00, 0x00, //
            0x84, b'o', b'k', 0x00,
        ]
    );
}

#[test]
fn test_msb_frame_decodes_with_tools() {
    let mut buffer = MsbBuffer::with_envelope(&[0xFF, 0xFF], &[]);
    buffer
        .write_command(CommandTag::Pair(0x02, 0x30))
        .write_short(-2)
        .write_uint16(0xBEEF);
    let frame = buffer.into_bytes();

    assert_eq!(&frame[..3], &[0xFF, 0xFF, 0x00]);
    assert_eq!(signed_bytes_to_int(&frame[5..]), Ok(-2));
    assert_eq!(bytes_to_int(&frame[7..]), Ok(0xBEEF));
    assert_eq!(
        bytes_to_int(&frame[8..]),
        Err(BytesError::TooShort {
            expected: 2,
            actual: 1
        })
    );
}

#[test]
fn test_envelope_marks_payload_length() {
    let payload = [0x01, 0x02, 0x03, 0x04, 0x05];
    let buffer = LsbBuffer::with_envelope(&[0xFF, 0x55], &payload);

    let frame = buffer.as_slice();
    assert_eq!(first_position(frame, &[0xFF, 0x55]), Some(0));
    assert_eq!(frame[2] as usize, payload.len());
    assert_eq!(&frame[3..], &payload);
}

#[test]
fn test_concatenated_frames_are_located() {
    let mut stream = Vec::new();
    for index in 0..3u8 {
        let mut payload = LsbBuffer::new();
        payload.write_index(index).write_all(&1.5f32.to_le_bytes());
        stream.extend(LsbBuffer::with_envelope(&[0xFF, 0x55], payload.as_slice()).into_bytes());
    }

    let starts = byte_positions(&stream, &[0xFF, 0x55]).unwrap();
    assert_eq!(starts, vec![0, 8, 16]);
    for (i, start) in starts.into_iter().enumerate() {
        assert_eq!(stream[start + 3], i as u8);
        assert_eq!(bytes_to_float32_le(&stream[start + 4..]), Ok(1.5));
    }
}

#[test]
fn test_string_field_reads_back_as_text() {
    let mut buffer = LsbBuffer::new();
    buffer.write_string(" robot ");
    assert_eq!(to_text(buffer.as_slice()), "robot");
}

#[test]
fn test_clear_keeps_header_table() {
    let mut buffer = MsbBuffer::with_headers(TAGGED);
    buffer.write_byte(1).set_routing_tag("input");
    buffer.clear();

    assert!(buffer.is_empty());
    buffer.write_byte(2);
    assert_eq!(buffer.as_slice(), &[0x81, 0x02]);
}
