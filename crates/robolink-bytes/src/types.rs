//! Field types, per-field header tables and command tags.

/// Logical type of a field written into a [`crate::ByteBuffer`].
///
/// Each type may have a header byte configured in a [`HeaderSpec`]; the buffer
/// emits it immediately before the field's payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Single byte.
    Byte,
    /// Two-byte value in the buffer's byte order.
    Short,
    /// Four-byte value, least significant byte first.
    Int,
    /// Single unsigned byte (low byte of the value).
    UInt,
    /// Two-byte unsigned value, most significant byte first.
    UInt16,
    /// Zero-terminated string.
    Str,
    /// Single index byte.
    Index,
    /// One- or two-byte command opcode.
    Command,
    /// Four-byte value in the buffer's byte order.
    Long,
}

impl DataType {
    /// Number of field types.
    pub const COUNT: usize = 9;

    /// All field types in table order.
    pub const ALL: [DataType; DataType::COUNT] = [
        DataType::Byte,
        DataType::Short,
        DataType::Int,
        DataType::UInt,
        DataType::UInt16,
        DataType::Str,
        DataType::Index,
        DataType::Command,
        DataType::Long,
    ];

    const fn slot(self) -> usize {
        match self {
            DataType::Byte => 0,
            DataType::Short => 1,
            DataType::Int => 2,
            DataType::UInt => 3,
            DataType::UInt16 => 4,
            DataType::Str => 5,
            DataType::Index => 6,
            DataType::Command => 7,
            DataType::Long => 8,
        }
    }
}

/// Optional header byte per field type.
///
/// Headers are opt-in: a type with no entry emits nothing extra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderSpec {
    headers: [Option<u8>; DataType::COUNT],
}

impl HeaderSpec {
    /// Creates an empty table.
    pub const fn new() -> Self {
        HeaderSpec {
            headers: [None; DataType::COUNT],
        }
    }

    /// Returns a copy of the table with `header` configured for `data_type`.
    pub const fn with(mut self, data_type: DataType, header: u8) -> Self {
        self.headers[data_type.slot()] = Some(header);
        self
    }

    /// Configures the header byte for `data_type`.
    pub fn set(&mut self, data_type: DataType, header: u8) {
        self.headers[data_type.slot()] = Some(header);
    }

    /// Removes the header for `data_type`.
    pub fn clear(&mut self, data_type: DataType) {
        self.headers[data_type.slot()] = None;
    }

    /// Returns the header byte for `data_type`, if any.
    pub fn get(&self, data_type: DataType) -> Option<u8> {
        self.headers[data_type.slot()]
    }

    /// Returns true when `data_type` has a header configured.
    pub fn contains(&self, data_type: DataType) -> bool {
        self.get(data_type).is_some()
    }
}

/// A command opcode: a single tag byte or a two-byte pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTag {
    /// One opcode byte.
    Single(u8),
    /// Two opcode bytes written in order.
    Pair(u8, u8),
}

impl CommandTag {
    /// Returns the opcode bytes in wire order.
    pub fn as_bytes(&self) -> Vec<u8> {
        match *self {
            CommandTag::Single(tag) => vec![tag],
            CommandTag::Pair(first, second) => vec![first, second],
        }
    }
}

impl From<u8> for CommandTag {
    fn from(tag: u8) -> Self {
        CommandTag::Single(tag)
    }
}

impl From<[u8; 2]> for CommandTag {
    fn from(pair: [u8; 2]) -> Self {
        CommandTag::Pair(pair[0], pair[1])
    }
}

impl From<(u8, u8)> for CommandTag {
    fn from((first, second): (u8, u8)) -> Self {
        CommandTag::Pair(first, second)
    }
}
