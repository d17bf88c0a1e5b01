//! PTU header tag types and values.

use serde::{Deserialize, Serialize};

/// Days between the `TDateTime` epoch (1899-12-30) and the Unix epoch.
const TDATETIME_UNIX_EPOCH_DAYS: f64 = 25_569.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Tag type codes as defined by the PicoQuant tagged header format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TagType {
    /// No value.
    Empty8 = 0xFFFF_0008,
    /// Boolean stored in the 8-byte value field.
    Bool8 = 0x0000_0008,
    /// Signed 64-bit integer.
    Int8 = 0x1000_0008,
    /// 64-bit bit set.
    BitSet64 = 0x1100_0008,
    /// RGB colour.
    Color8 = 0x1200_0008,
    /// IEEE double stored as its bit pattern.
    Float8 = 0x2000_0008,
    /// Delphi `TDateTime` double (days since 1899-12-30).
    TDateTime = 0x2100_0008,
    /// Array of doubles; value is the payload length in bytes.
    Float8Array = 0x2001_FFFF,
    /// 8-bit string; value is the payload length in bytes.
    AnsiString = 0x4001_FFFF,
    /// UTF-16 string; value is the payload length in bytes.
    WideString = 0x4002_FFFF,
    /// Opaque bytes; value is the payload length in bytes.
    BinaryBlob = 0xFFFF_FFFF,
}

impl TagType {
    /// All tag types, in table order.
    pub const ALL: [TagType; 11] = [
        TagType::Empty8,
        TagType::Bool8,
        TagType::Int8,
        TagType::BitSet64,
        TagType::Color8,
        TagType::Float8,
        TagType::TDateTime,
        TagType::Float8Array,
        TagType::AnsiString,
        TagType::WideString,
        TagType::BinaryBlob,
    ];

    /// Looks up a tag type from its on-disk code.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0xFFFF_0008 => Some(TagType::Empty8),
            0x0000_0008 => Some(TagType::Bool8),
            0x1000_0008 => Some(TagType::Int8),
            0x1100_0008 => Some(TagType::BitSet64),
            0x1200_0008 => Some(TagType::Color8),
            0x2000_0008 => Some(TagType::Float8),
            0x2100_0008 => Some(TagType::TDateTime),
            0x2001_FFFF => Some(TagType::Float8Array),
            0x4001_FFFF => Some(TagType::AnsiString),
            0x4002_FFFF => Some(TagType::WideString),
            0xFFFF_FFFF => Some(TagType::BinaryBlob),
            _ => None,
        }
    }

    /// On-disk code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Whether the tag is followed by a payload of `value` bytes.
    #[must_use]
    pub const fn has_payload(self) -> bool {
        matches!(
            self,
            TagType::Float8Array | TagType::AnsiString | TagType::WideString | TagType::BinaryBlob
        )
    }
}

/// A decoded tag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TagValue {
    /// `Empty8`.
    Empty,
    /// `Bool8`.
    Bool(bool),
    /// `Int8`.
    Int(i64),
    /// `BitSet64`.
    BitSet(i64),
    /// `Color8`.
    Color(i64),
    /// `Float8`.
    Float(f64),
    /// `TDateTime`, kept both raw and formatted as `%Y-%m-%d %H:%M:%S` UTC.
    DateTime {
        /// Days since 1899-12-30.
        days: f64,
        /// Formatted UTC timestamp.
        formatted: String,
    },
    /// `Float8Array`.
    FloatArray(Vec<f64>),
    /// `AnsiString`.
    AnsiString(String),
    /// `WideString`.
    WideString(String),
    /// `BinaryBlob`.
    BinaryBlob(Vec<u8>),
}

impl TagValue {
    /// Tag type this value is stored as.
    #[must_use]
    pub fn tag_type(&self) -> TagType {
        match self {
            TagValue::Empty => TagType::Empty8,
            TagValue::Bool(_) => TagType::Bool8,
            TagValue::Int(_) => TagType::Int8,
            TagValue::BitSet(_) => TagType::BitSet64,
            TagValue::Color(_) => TagType::Color8,
            TagValue::Float(_) => TagType::Float8,
            TagValue::DateTime { .. } => TagType::TDateTime,
            TagValue::FloatArray(_) => TagType::Float8Array,
            TagValue::AnsiString(_) => TagType::AnsiString,
            TagValue::WideString(_) => TagType::WideString,
            TagValue::BinaryBlob(_) => TagType::BinaryBlob,
        }
    }

    /// Builds a `DateTime` value from a `TDateTime` day count.
    #[must_use]
    pub fn date_time(days: f64) -> Self {
        TagValue::DateTime {
            days,
            formatted: format_tdatetime(days),
        }
    }

    /// Integer view of integral values (`Int`, `BitSet`, `Color`, `Bool`).
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            TagValue::Int(v) | TagValue::BitSet(v) | TagValue::Color(v) => Some(v),
            TagValue::Bool(b) => Some(i64::from(b)),
            _ => None,
        }
    }

    /// Float view of numeric values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            TagValue::Float(v) => Some(v),
            TagValue::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    /// String view of string values (including formatted timestamps).
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::AnsiString(s) | TagValue::WideString(s) => Some(s),
            TagValue::DateTime { formatted, .. } => Some(formatted),
            _ => None,
        }
    }

    /// Plain JSON representation (numbers, strings, arrays).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            TagValue::Empty => Value::Null,
            TagValue::Bool(b) => Value::Bool(*b),
            TagValue::Int(v) | TagValue::BitSet(v) | TagValue::Color(v) => Value::from(*v),
            TagValue::Float(v) => Value::from(*v),
            TagValue::DateTime { formatted, .. } => Value::from(formatted.as_str()),
            TagValue::FloatArray(values) => Value::from(values.clone()),
            TagValue::AnsiString(s) | TagValue::WideString(s) => Value::from(s.as_str()),
            TagValue::BinaryBlob(bytes) => Value::from(bytes.clone()),
        }
    }
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValue::Empty => write!(f, "<empty>"),
            TagValue::Bool(b) => write!(f, "{b}"),
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::BitSet(v) | TagValue::Color(v) => write!(f, "{v:#x}"),
            TagValue::Float(v) => write!(f, "{v}"),
            TagValue::DateTime { formatted, .. } => write!(f, "{formatted}"),
            TagValue::FloatArray(values) => write!(f, "<{} floats>", values.len()),
            TagValue::AnsiString(s) | TagValue::WideString(s) => write!(f, "{s}"),
            TagValue::BinaryBlob(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// One header tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderTag {
    /// Tag identifier (at most 32 bytes on disk).
    pub name: String,
    /// Array index, `-1` for scalar tags.
    pub index: i32,
    /// Decoded value.
    pub value: TagValue,
}

impl HeaderTag {
    /// Creates a scalar tag.
    pub fn new(name: impl Into<String>, value: TagValue) -> Self {
        Self {
            name: name.into(),
            index: -1,
            value,
        }
    }

    /// Creates an indexed tag.
    pub fn indexed(name: impl Into<String>, index: i32, value: TagValue) -> Self {
        Self {
            name: name.into(),
            index,
            value,
        }
    }

    /// Tag type of the value.
    #[must_use]
    pub fn tag_type(&self) -> TagType {
        self.value.tag_type()
    }

    /// Display key: `name` for scalar tags, `name(index)` otherwise.
    #[must_use]
    pub fn key(&self) -> String {
        if self.index < 0 {
            self.name.clone()
        } else {
            format!("{}({})", self.name, self.index)
        }
    }
}

/// Formats a `TDateTime` day count as a UTC timestamp, truncated to seconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_tdatetime(days: f64) -> String {
    let seconds = ((days - TDATETIME_UNIX_EPOCH_DAYS) * SECONDS_PER_DAY).floor();
    if !seconds.is_finite() {
        return days.to_string();
    }
    match chrono::DateTime::from_timestamp(seconds as i64, 0) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => days.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_type_codes_round_trip() {
        for ty in TagType::ALL {
            assert_eq!(TagType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(TagType::from_code(0x1234_5678), None);
    }

    #[test]
    fn test_payload_types() {
        assert!(TagType::AnsiString.has_payload());
        assert!(TagType::BinaryBlob.has_payload());
        assert!(!TagType::Int8.has_payload());
        assert!(!TagType::TDateTime.has_payload());
    }

    #[test]
    fn test_format_tdatetime() {
        // 25569 days is exactly the Unix epoch.
        assert_eq!(format_tdatetime(25_569.0), "1970-01-01 00:00:00");
        // Half a day later.
        assert_eq!(format_tdatetime(25_569.5), "1970-01-01 12:00:00");
        // 2019-05-14 00:00:00 UTC
        assert_eq!(format_tdatetime(43_599.0), "2019-05-14 00:00:00");
    }

    #[test]
    fn test_value_views() {
        assert_eq!(TagValue::Int(5).as_i64(), Some(5));
        assert_eq!(TagValue::Bool(true).as_i64(), Some(1));
        assert_eq!(TagValue::Int(5).as_f64(), Some(5.0));
        assert_eq!(TagValue::Float(2.5).as_i64(), None);
        assert_eq!(TagValue::AnsiString("x".into()).as_str(), Some("x"));
        assert_eq!(TagValue::date_time(25_569.0).as_str(), Some("1970-01-01 00:00:00"));
    }

    #[test]
    fn test_tag_key() {
        assert_eq!(HeaderTag::new("ImgHdr_PixX", TagValue::Int(1)).key(), "ImgHdr_PixX");
        assert_eq!(
            HeaderTag::indexed("HWInpChan_Offs", 2, TagValue::Int(0)).key(),
            "HWInpChan_Offs(2)"
        );
    }
}
