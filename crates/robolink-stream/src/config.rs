//! Serializable stream reader settings.
//!
//! Byte sequences are written as hex strings in configuration files, with
//! optional whitespace between bytes:
//!
//! ```yaml
//! headers: ["ff ff", "ff fe"]
//! minimum_size: 7
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A fixed byte sequence written as a hex string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteSeq(pub Vec<u8>);

impl ByteSeq {
    /// Parses a hex string such as `"ff55"` or `"FF 55"`.
    pub fn parse(s: &str) -> Result<Self, hex::FromHexError> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(compact).map(ByteSeq)
    }

    /// Borrows the bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for ByteSeq {
    fn from(bytes: &[u8]) -> Self {
        ByteSeq(bytes.to_vec())
    }
}

impl fmt::Display for ByteSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl Serialize for ByteSeq {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ByteSeq {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ByteSeq::parse(&s)
            .map_err(|e| serde::de::Error::custom(format!("invalid byte sequence '{}': {}", s, e)))
    }
}

/// Framing policy for one connection.
///
/// The checksum predicate is code, not data, and is attached separately with
/// [`crate::StreamReader::with_checksum`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Alternative sequences that may open a frame. Empty means any bytes.
    pub headers: Vec<ByteSeq>,
    /// Sequence closing a frame, for footer-delimited protocols.
    pub footer: Option<ByteSeq>,
    /// Smallest admissible frame length.
    pub minimum_size: usize,
    /// Upper bound on bytes retained between reads.
    pub max_pending: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_seq_parse() {
        assert_eq!(ByteSeq::parse("ff55").unwrap().0, vec![0xFF, 0x55]);
        assert_eq!(ByteSeq::parse("FF 55 0d").unwrap().0, vec![0xFF, 0x55, 0x0D]);
        assert!(ByteSeq::parse("f").is_err());
        assert!(ByteSeq::parse("zz").is_err());
    }

    #[test]
    fn test_byte_seq_display() {
        assert_eq!(ByteSeq(vec![0x0D, 0x0A]).to_string(), "0d0a");
    }

    #[test]
    fn test_reader_config_yaml() {
        let yaml = r#"
headers: ["ff ff", "fffe"]
minimum_size: 7
"#;
        let config: ReaderConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.headers,
            vec![ByteSeq(vec![0xFF, 0xFF]), ByteSeq(vec![0xFF, 0xFE])]
        );
        assert_eq!(config.footer, None);
        assert_eq!(config.minimum_size, 7);
        assert_eq!(config.max_pending, None);
    }

    #[test]
    fn test_reader_config_roundtrip() {
        let config = ReaderConfig {
            headers: vec![ByteSeq(vec![0xFF, 0x55])],
            footer: Some(ByteSeq(vec![0x0D, 0x0A])),
            minimum_size: 4,
            max_pending: Some(256),
        };
        let serialized = serde_yaml::to_string(&config).unwrap();
        assert!(serialized.contains("ff55"));
        let parsed: ReaderConfig = serde_yaml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_reader_config_rejects_bad_hex() {
        let result: Result<ReaderConfig, _> = serde_yaml::from_str("headers: [\"xyz\"]");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid byte sequence"));
    }
}
