//! Typed byte writer for one outgoing wire frame.
//!
//! A [`ByteBuffer`] accumulates the payload of a single command. Every typed
//! write first emits the header byte configured for its [`DataType`] (if any)
//! and then the value bytes, so a field is always written whole.
//!
//! The byte order of multi-byte writes is a type parameter:
//!
//! ```text
//! write_short(0x0102)   Lsb -> [0x02, 0x01]   Msb -> [0x01, 0x02]
//! ```
//!
//! Writes never fail. Values are masked to the width of the field.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::types::{CommandTag, DataType, HeaderSpec};

/// Metadata key under which the routing tag is stored.
pub const ROUTING_TAG_KEY: &str = "routing_tag";

/// Byte order used for `Short` and `Long` writes.
pub trait ByteOrder {
    /// Short name used in debug output.
    const NAME: &'static str;

    /// Encodes a 16-bit value.
    fn short(value: u16) -> [u8; 2];

    /// Encodes a 32-bit value.
    fn long(value: u32) -> [u8; 4];
}

/// Least significant byte first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lsb;

/// Most significant byte first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Msb;

impl ByteOrder for Lsb {
    const NAME: &'static str = "lsb";

    fn short(value: u16) -> [u8; 2] {
        value.to_le_bytes()
    }

    fn long(value: u32) -> [u8; 4] {
        value.to_le_bytes()
    }
}

impl ByteOrder for Msb {
    const NAME: &'static str = "msb";

    fn short(value: u16) -> [u8; 2] {
        value.to_be_bytes()
    }

    fn long(value: u32) -> [u8; 4] {
        value.to_be_bytes()
    }
}

/// Ordered output bytes plus per-type headers and routing metadata.
pub struct ByteBuffer<E: ByteOrder = Lsb> {
    data: Vec<u8>,
    headers: HeaderSpec,
    meta: BTreeMap<String, String>,
    order: PhantomData<E>,
}

/// Buffer writing multi-byte values least significant byte first.
pub type LsbBuffer = ByteBuffer<Lsb>;

/// Buffer writing multi-byte values most significant byte first.
pub type MsbBuffer = ByteBuffer<Msb>;

impl<E: ByteOrder> ByteBuffer<E> {
    /// Creates an empty buffer with no headers.
    pub fn new() -> Self {
        Self::with_headers(HeaderSpec::new())
    }

    /// Creates an empty buffer using a protocol's header table.
    pub fn with_headers(headers: HeaderSpec) -> Self {
        ByteBuffer {
            data: Vec::new(),
            headers,
            meta: BTreeMap::new(),
            order: PhantomData,
        }
    }

    /// Creates a buffer holding `data` verbatim.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.data.extend_from_slice(data);
        buffer
    }

    /// Builds `sync ++ [len] ++ payload` as a new buffer.
    ///
    /// The length byte is the payload length truncated to 8 bits.
    pub fn with_envelope(sync: &[u8], payload: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.write_all(sync);
        buffer.write(payload.len() as u8);
        buffer.write_all(payload);
        buffer
    }

    // ------------------------------------------------------------------------
    // Raw writes
    // ------------------------------------------------------------------------

    /// Appends one byte without any header.
    pub fn write(&mut self, byte: u8) -> &mut Self {
        self.data.push(byte);
        self
    }

    /// Appends raw bytes without any header.
    pub fn write_all(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    fn write_header(&mut self, data_type: DataType) {
        if let Some(header) = self.headers.get(data_type) {
            self.data.push(header);
        }
    }

    // ------------------------------------------------------------------------
    // Typed writes
    // ------------------------------------------------------------------------

    /// Writes a byte field.
    pub fn write_byte(&mut self, value: u8) -> &mut Self {
        self.write_header(DataType::Byte);
        self.write(value)
    }

    /// Writes a byte field, falling back to `default` when `value` is unset.
    pub fn write_byte_or(&mut self, value: Option<u8>, default: u8) -> &mut Self {
        self.write_byte(value.unwrap_or(default))
    }

    /// Writes a `0x00` byte field.
    pub fn write_null_byte(&mut self) -> &mut Self {
        self.write_byte(0x00)
    }

    /// Writes a `0x01` byte field.
    pub fn write_single_byte(&mut self) -> &mut Self {
        self.write_byte(0x01)
    }

    /// Writes a 16-bit field in the buffer's byte order.
    ///
    /// Negative values are written in two's complement.
    pub fn write_short(&mut self, value: i32) -> &mut Self {
        self.write_header(DataType::Short);
        self.write_all(&E::short(value as u16))
    }

    /// Writes a 32-bit field in the buffer's byte order.
    pub fn write_long(&mut self, value: i32) -> &mut Self {
        self.write_header(DataType::Long);
        self.write_all(&E::long(value as u32))
    }

    /// Writes a 32-bit field least significant byte first, regardless of the
    /// buffer's byte order.
    pub fn write_int(&mut self, value: i32) -> &mut Self {
        self.write_header(DataType::Int);
        self.write_all(&value.to_le_bytes())
    }

    /// Writes the low byte of `value` as an unsigned field.
    pub fn write_uint(&mut self, value: u32) -> &mut Self {
        self.write_header(DataType::UInt);
        self.write(value as u8)
    }

    /// Writes a 16-bit unsigned field most significant byte first.
    pub fn write_uint16(&mut self, value: u16) -> &mut Self {
        self.write_header(DataType::UInt16);
        self.write_all(&value.to_be_bytes())
    }

    /// Writes one byte per character followed by a zero terminator.
    ///
    /// Characters outside the byte range keep only their low byte.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_header(DataType::Str);
        for c in value.chars() {
            self.data.push(c as u32 as u8);
        }
        self.write(0x00)
    }

    /// Writes a one- or two-byte command opcode.
    pub fn write_command(&mut self, command: impl Into<CommandTag>) -> &mut Self {
        self.write_header(DataType::Command);
        match command.into() {
            CommandTag::Single(tag) => self.write(tag),
            CommandTag::Pair(first, second) => self.write(first).write(second),
        }
    }

    /// Writes an index byte field.
    pub fn write_index(&mut self, value: u8) -> &mut Self {
        self.write_header(DataType::Index);
        self.write(value)
    }

    // ------------------------------------------------------------------------
    // Headers
    // ------------------------------------------------------------------------

    /// Configures the header byte emitted before fields of `data_type`.
    pub fn set_header(&mut self, data_type: DataType, header: u8) -> &mut Self {
        self.headers.set(data_type, header);
        self
    }

    /// Removes the header for `data_type`.
    pub fn clear_header(&mut self, data_type: DataType) -> &mut Self {
        self.headers.clear(data_type);
        self
    }

    /// Returns true when `data_type` has a header configured.
    pub fn has_header(&self, data_type: DataType) -> bool {
        self.headers.contains(data_type)
    }

    /// Returns the header byte for `data_type`, if any.
    pub fn header(&self, data_type: DataType) -> Option<u8> {
        self.headers.get(data_type)
    }

    /// Returns the full header table.
    pub fn headers(&self) -> &HeaderSpec {
        &self.headers
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    /// Attaches the routing tag the transport uses to pick a channel.
    pub fn set_routing_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.set_meta(ROUTING_TAG_KEY, tag)
    }

    /// Returns the routing tag, if one was attached.
    pub fn routing_tag(&self) -> Option<&str> {
        self.meta(ROUTING_TAG_KEY)
    }

    /// Stores an arbitrary metadata entry.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Returns a metadata entry.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the accumulated bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copies out the accumulated bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Consumes the buffer, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Clears data and metadata. Headers are kept.
    pub fn clear(&mut self) {
        self.data.clear();
        self.meta.clear();
    }
}

impl<E: ByteOrder> Default for ByteBuffer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ByteOrder> Clone for ByteBuffer<E> {
    fn clone(&self) -> Self {
        ByteBuffer {
            data: self.data.clone(),
            headers: self.headers,
            meta: self.meta.clone(),
            order: PhantomData,
        }
    }
}

impl<E: ByteOrder> fmt::Debug for ByteBuffer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("order", &E::NAME)
            .field("data", &format_args!("{:02X?}", self.data))
            .field("meta", &self.meta)
            .finish()
    }
}

impl<E: ByteOrder> From<ByteBuffer<E>> for Vec<u8> {
    fn from(buffer: ByteBuffer<E>) -> Self {
        buffer.into_bytes()
    }
}
