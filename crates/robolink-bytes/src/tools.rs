//! Stateless byte helpers.
//!
//! Integer decoding from device responses plus the sub-sequence search used by
//! the stream reader to find frame headers and footers.
//!
//! The search is a plain O(n·m) scan. Frames on the targeted links are tens of
//! bytes long and headers are one to three bytes, so nothing smarter is used.

use crate::error::{BytesError, BytesResult};

/// Decodes a big-endian unsigned 16-bit value from the first two bytes.
pub fn bytes_to_int(data: &[u8]) -> BytesResult<u16> {
    BytesError::require(data, 2)?;
    Ok(u16::from_be_bytes([data[0], data[1]]))
}

/// Decodes a big-endian signed 16-bit value from the first two bytes.
pub fn signed_bytes_to_int(data: &[u8]) -> BytesResult<i16> {
    BytesError::require(data, 2)?;
    Ok(i16::from_be_bytes([data[0], data[1]]))
}

/// Decodes a big-endian unsigned 32-bit value from the first four bytes.
pub fn bytes_to_int32(data: &[u8]) -> BytesResult<u32> {
    BytesError::require(data, 4)?;
    Ok(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
}

/// Decodes a little-endian signed 32-bit value from the first four bytes.
pub fn bytes_to_int32_le(data: &[u8]) -> BytesResult<i32> {
    BytesError::require(data, 4)?;
    Ok(i32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

/// Decodes a little-endian IEEE-754 float from the first four bytes.
///
/// Makeblock firmware reports analog sensor values this way.
pub fn bytes_to_float32_le(data: &[u8]) -> BytesResult<f32> {
    BytesError::require(data, 4)?;
    Ok(f32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

/// Returns true when both sequences hold the same bytes.
pub fn is_equal(a: &[u8], b: &[u8]) -> bool {
    a == b
}

/// Concatenates two byte sequences into a new vector.
pub fn join(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut joined = Vec::with_capacity(a.len() + b.len());
    joined.extend_from_slice(a);
    joined.extend_from_slice(b);
    joined
}

/// Decodes one character per byte, strips NULs and trims whitespace.
pub fn to_text(data: &[u8]) -> String {
    data.iter()
        .filter(|&&b| b != 0)
        .map(|&b| b as char)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Returns every offset at which `needle` fully occurs in `haystack`.
///
/// Overlapping matches are reported. Returns `None` when there is no match,
/// when either input is empty, or when the needle is longer than the haystack.
pub fn byte_positions(haystack: &[u8], needle: &[u8]) -> Option<Vec<usize>> {
    if haystack.is_empty() || needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    let positions: Vec<usize> = haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(i, _)| i)
        .collect();

    if positions.is_empty() {
        None
    } else {
        Some(positions)
    }
}

/// Returns the first offset at which `needle` fully occurs in `haystack`.
pub fn first_position(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
