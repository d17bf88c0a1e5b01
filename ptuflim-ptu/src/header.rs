//! PTU tagged header parser and encoder.
//!
//! Layout (little endian):
//!
//! | offset | size | content                                   |
//! |--------|------|-------------------------------------------|
//! | 0      | 8    | magic `"PQTTTR"`, NUL padded              |
//! | 8      | 8    | version string, NUL padded                |
//! | 16     | 48×n | tag records `name[32] idx:i32 type:u32 value:i64`, each optionally followed by `value` payload bytes |
//!
//! The header ends with the `Header_End` tag; TTTR records start right after it.

use crate::record::RecordType;
use crate::tag::{HeaderTag, TagType, TagValue};
use crate::{Error, Result};
use ptuflim_core::{ImagingParams, Markers, ScannerKind};
use serde::{Deserialize, Serialize};

/// Magic identifying PTU files.
pub const PTU_MAGIC: &[u8] = b"PQTTTR";
/// Name of the tag closing the header.
pub const HEADER_END: &str = "Header_End";
/// Size of a fixed tag record.
pub const TAG_RECORD_SIZE: usize = 48;
/// Offset of the first tag record.
pub const FIRST_TAG_OFFSET: usize = 16;

const TAG_NAME_SIZE: usize = 32;

/// Well-known tag identifiers.
pub mod tags {
    /// TTTR record type code.
    pub const RECORD_TYPE: &str = "TTResultFormat_TTTRRecType";
    /// Number of TTTR records.
    pub const NUMBER_OF_RECORDS: &str = "TTResult_NumberOfRecords";
    /// Pixels per line.
    pub const PIX_X: &str = "ImgHdr_PixX";
    /// Lines per frame.
    pub const PIX_Y: &str = "ImgHdr_PixY";
    /// Line start marker bit.
    pub const LINE_START: &str = "ImgHdr_LineStart";
    /// Line stop marker bit.
    pub const LINE_STOP: &str = "ImgHdr_LineStop";
    /// Frame marker bit.
    pub const FRAME: &str = "ImgHdr_Frame";
    /// Scanner identifier.
    pub const IDENT: &str = "ImgHdr_Ident";
    /// Measurement sub mode.
    pub const SUB_MODE: &str = "Measurement_SubMode";
    /// Microtime resolution in seconds.
    pub const RESOLUTION: &str = "MeasDesc_Resolution";
    /// Sync period in seconds.
    pub const GLOBAL_RESOLUTION: &str = "MeasDesc_GlobalResolution";
    /// Sync rate in Hz.
    pub const SYNC_RATE: &str = "TTResult_SyncRate";
}

/// A parsed PTU header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    version: String,
    tags: Vec<HeaderTag>,
    data_offset: usize,
}

impl Header {
    /// Parses the header at the start of `data`.
    ///
    /// # Errors
    /// - [`Error::FormatError`] if the magic is missing (nothing else is read).
    /// - [`Error::UnsupportedTagType`] for unknown tag type codes.
    /// - [`Error::TruncatedHeader`] if a tag or its payload runs past the end
    ///   of `data`, or `Header_End` is never found.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let magic = data
            .get(..8)
            .ok_or_else(|| Error::FormatError(format!("file too short ({} bytes)", data.len())))?;
        if trim_nul(magic) != PTU_MAGIC {
            return Err(Error::FormatError(format!(
                "bad magic {:?}, expected \"PQTTTR\"",
                String::from_utf8_lossy(trim_nul(magic))
            )));
        }
        let version = data
            .get(8..FIRST_TAG_OFFSET)
            .ok_or_else(|| Error::TruncatedHeader {
                offset: 8,
                reason: "missing version string".into(),
            })?;
        let version = String::from_utf8_lossy(trim_nul(version)).into_owned();

        let mut tags = Vec::new();
        let mut offset = FIRST_TAG_OFFSET;
        loop {
            let (tag, next) = read_tag(data, offset)?;
            offset = next;
            let done = tag.name == HEADER_END;
            tags.push(tag);
            if done {
                break;
            }
        }

        log::debug!(
            "parsed PTU header version {version}: {} tags, data offset {offset}",
            tags.len()
        );

        Ok(Self {
            version,
            tags,
            data_offset: offset,
        })
    }

    /// Version string from the preamble.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// All tags in file order, including `Header_End`.
    #[must_use]
    pub fn tags(&self) -> &[HeaderTag] {
        &self.tags
    }

    /// Byte offset of the first TTTR record.
    #[must_use]
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// Looks up a tag by name. Scalar tags (index `-1`) win over indexed
    /// ones; among equals the last occurrence wins.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TagValue> {
        let mut indexed = None;
        for tag in self.tags.iter().rev().filter(|t| t.name == name) {
            if tag.index < 0 {
                return Some(&tag.value);
            }
            indexed.get_or_insert(&tag.value);
        }
        indexed
    }

    /// Looks up an indexed tag.
    #[must_use]
    pub fn get_indexed(&self, name: &str, index: i32) -> Option<&TagValue> {
        self.tags
            .iter()
            .rev()
            .find(|t| t.name == name && t.index == index)
            .map(|t| &t.value)
    }

    /// Returns true if a tag with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    /// Integer tag value.
    ///
    /// # Errors
    /// [`Error::MissingTag`] or [`Error::InvalidTagValue`].
    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self
            .get(name)
            .ok_or_else(|| Error::MissingTag(name.to_string()))?;
        value.as_i64().ok_or_else(|| Error::InvalidTagValue {
            name: name.to_string(),
            reason: format!("expected integer, found {:?}", value.tag_type()),
        })
    }

    /// Integer tag value, or `default` when the tag is absent.
    ///
    /// # Errors
    /// [`Error::InvalidTagValue`] if the tag exists but is not an integer.
    pub fn int_or(&self, name: &str, default: i64) -> Result<i64> {
        if self.contains(name) {
            self.int(name)
        } else {
            Ok(default)
        }
    }

    /// Float tag value (integers are widened).
    ///
    /// # Errors
    /// [`Error::MissingTag`] or [`Error::InvalidTagValue`].
    pub fn float(&self, name: &str) -> Result<f64> {
        let value = self
            .get(name)
            .ok_or_else(|| Error::MissingTag(name.to_string()))?;
        value.as_f64().ok_or_else(|| Error::InvalidTagValue {
            name: name.to_string(),
            reason: format!("expected float, found {:?}", value.tag_type()),
        })
    }

    /// Non-negative integer tag value as `usize`.
    ///
    /// # Errors
    /// [`Error::MissingTag`] or [`Error::InvalidTagValue`].
    pub fn count(&self, name: &str) -> Result<usize> {
        let value = self.int(name)?;
        usize::try_from(value).map_err(|_| Error::InvalidTagValue {
            name: name.to_string(),
            reason: format!("expected non-negative count, found {value}"),
        })
    }

    /// TTTR record type.
    ///
    /// # Errors
    /// [`Error::UnsupportedHardware`] for unknown codes, tag errors otherwise.
    pub fn record_type(&self) -> Result<RecordType> {
        let code = self.int(tags::RECORD_TYPE)?;
        let code = u32::try_from(code).map_err(|_| Error::InvalidTagValue {
            name: tags::RECORD_TYPE.to_string(),
            reason: format!("{code} does not fit a 32-bit record type code"),
        })?;
        RecordType::from_code(code).ok_or(Error::UnsupportedHardware(code))
    }

    /// Number of TTTR records.
    ///
    /// # Errors
    /// Tag errors.
    pub fn record_count(&self) -> Result<usize> {
        self.count(tags::NUMBER_OF_RECORDS)
    }

    /// Imaging parameters for the frame assembler.
    ///
    /// Marker bit positions default to 1/2/3 when absent.
    ///
    /// # Errors
    /// Tag errors, or [`ptuflim_core::Error::NotFlimData`] for marker bits
    /// outside `1..=8`.
    pub fn imaging_params(&self) -> Result<ImagingParams> {
        let markers = Markers::from_bits(
            self.int_or(tags::LINE_START, 1)?,
            self.int_or(tags::LINE_STOP, 2)?,
            self.int_or(tags::FRAME, 3)?,
        )?;
        Ok(ImagingParams {
            pixels_x: self.count(tags::PIX_X)?,
            pixels_y: self.count(tags::PIX_Y)?,
            markers,
            scanner: ScannerKind::from_ident(self.int(tags::IDENT)?),
            measurement_submode: self.int(tags::SUB_MODE)?,
            microtime_resolution_s: self.float(tags::RESOLUTION)?,
            sync_period_s: self.float(tags::GLOBAL_RESOLUTION)?,
        })
    }

    /// Plain JSON object keyed by [`HeaderTag::key`], plus `Header_End`
    /// mapped to the data offset.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for tag in &self.tags {
            if tag.name == HEADER_END {
                continue;
            }
            map.insert(tag.key(), tag.value.to_json());
        }
        map.insert(HEADER_END.to_string(), serde_json::Value::from(self.data_offset));
        serde_json::Value::Object(map)
    }

    /// Encodes the header in PTU layout. The result is exactly
    /// [`Header::data_offset`] bytes long when the header was produced by
    /// [`HeaderBuilder`] or parsed from a file written the same way.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data_offset.max(FIRST_TAG_OFFSET));
        out.extend_from_slice(&padded(PTU_MAGIC, 8));
        out.extend_from_slice(&padded(self.version.as_bytes(), 8));
        for tag in &self.tags {
            encode_tag(tag, &mut out);
        }
        out
    }
}

/// Builds a header tag by tag, appending `Header_End` on [`HeaderBuilder::build`].
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    version: String,
    tags: Vec<HeaderTag>,
}

impl Default for HeaderBuilder {
    fn default() -> Self {
        Self::new("1.0.00")
    }
}

impl HeaderBuilder {
    /// Starts a header with the given version string.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            tags: Vec::new(),
        }
    }

    /// Appends a scalar tag.
    #[must_use]
    pub fn tag(mut self, name: impl Into<String>, value: TagValue) -> Self {
        self.tags.push(HeaderTag::new(name, value));
        self
    }

    /// Appends an indexed tag.
    #[must_use]
    pub fn indexed_tag(mut self, name: impl Into<String>, index: i32, value: TagValue) -> Self {
        self.tags.push(HeaderTag::indexed(name, index, value));
        self
    }

    /// Finishes the header.
    ///
    /// # Errors
    /// [`Error::InvalidTagValue`] for names longer than 32 bytes, names
    /// containing NUL, a version longer than 8 bytes, or an explicit
    /// `Header_End` tag.
    pub fn build(self) -> Result<Header> {
        if self.version.len() > 8 {
            return Err(Error::InvalidTagValue {
                name: "version".into(),
                reason: format!("'{}' is longer than 8 bytes", self.version),
            });
        }
        for tag in &self.tags {
            if tag.name.len() > TAG_NAME_SIZE || tag.name.contains('\0') {
                return Err(Error::InvalidTagValue {
                    name: tag.name.clone(),
                    reason: "tag names are at most 32 bytes without NUL".into(),
                });
            }
            if tag.name == HEADER_END {
                return Err(Error::InvalidTagValue {
                    name: tag.name.clone(),
                    reason: "Header_End is appended by the builder".into(),
                });
            }
        }

        let mut tags = self.tags;
        tags.push(HeaderTag::new(HEADER_END, TagValue::Empty));
        let mut header = Header {
            version: self.version,
            tags,
            data_offset: 0,
        };
        header.data_offset = header.to_bytes().len();
        Ok(header)
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

fn padded(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut out = bytes[..bytes.len().min(len)].to_vec();
    out.resize(len, 0);
    out
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn le_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    i64::from_le_bytes(buf)
}

/// Reads the tag record at `offset`. Returns the tag and the offset of the
/// next record.
fn read_tag(data: &[u8], offset: usize) -> Result<(HeaderTag, usize)> {
    let record = data
        .get(offset..offset + TAG_RECORD_SIZE)
        .ok_or_else(|| Error::TruncatedHeader {
            offset,
            reason: if offset >= data.len() {
                "end of file before Header_End".into()
            } else {
                "partial tag record".into()
            },
        })?;

    let name_bytes = &record[..TAG_NAME_SIZE];
    let name_end = name_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(TAG_NAME_SIZE);
    let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();
    #[allow(clippy::cast_possible_wrap)]
    let index = le_u32(&record[32..36]) as i32;
    let code = le_u32(&record[36..40]);
    let raw = le_i64(&record[40..48]);

    let tag_type =
        TagType::from_code(code).ok_or_else(|| Error::UnsupportedTagType {
            name: name.clone(),
            code,
        })?;

    let mut next = offset + TAG_RECORD_SIZE;
    let payload = if tag_type.has_payload() {
        let len = usize::try_from(raw).map_err(|_| Error::TruncatedHeader {
            offset,
            reason: format!("negative payload length {raw} for tag '{name}'"),
        })?;
        let bytes = data
            .get(next..next.saturating_add(len))
            .filter(|b| b.len() == len)
            .ok_or_else(|| Error::TruncatedHeader {
                offset: next,
                reason: format!("payload of {len} bytes for tag '{name}' runs past end of file"),
            })?;
        next += len;
        bytes
    } else {
        &[]
    };

    let value = match tag_type {
        TagType::Empty8 => TagValue::Empty,
        TagType::Bool8 => TagValue::Bool(raw != 0),
        TagType::Int8 => TagValue::Int(raw),
        TagType::BitSet64 => TagValue::BitSet(raw),
        TagType::Color8 => TagValue::Color(raw),
        #[allow(clippy::cast_sign_loss)]
        TagType::Float8 => TagValue::Float(f64::from_bits(raw as u64)),
        #[allow(clippy::cast_sign_loss)]
        TagType::TDateTime => TagValue::date_time(f64::from_bits(raw as u64)),
        TagType::Float8Array => TagValue::FloatArray(
            payload
                .chunks_exact(8)
                .map(|c| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(c);
                    f64::from_le_bytes(buf)
                })
                .collect(),
        ),
        TagType::AnsiString => {
            TagValue::AnsiString(String::from_utf8_lossy(trim_nul(payload)).into_owned())
        }
        TagType::WideString => {
            let mut units: Vec<u16> = payload
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            while units.last() == Some(&0) {
                units.pop();
            }
            TagValue::WideString(String::from_utf16_lossy(&units))
        }
        TagType::BinaryBlob => TagValue::BinaryBlob(payload.to_vec()),
    };

    Ok((HeaderTag { name, index, value }, next))
}

fn pad_to_8(mut bytes: Vec<u8>) -> Vec<u8> {
    let rem = bytes.len() % 8;
    if rem != 0 {
        bytes.resize(bytes.len() + 8 - rem, 0);
    }
    bytes
}

#[allow(clippy::cast_possible_wrap)]
fn encode_tag(tag: &HeaderTag, out: &mut Vec<u8>) {
    let (raw, payload): (i64, Vec<u8>) = match &tag.value {
        TagValue::Empty => (0, Vec::new()),
        TagValue::Bool(b) => (i64::from(*b), Vec::new()),
        TagValue::Int(v) | TagValue::BitSet(v) | TagValue::Color(v) => (*v, Vec::new()),
        TagValue::Float(v) | TagValue::DateTime { days: v, .. } => {
            (v.to_bits() as i64, Vec::new())
        }
        TagValue::FloatArray(values) => {
            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            (bytes.len() as i64, bytes)
        }
        TagValue::AnsiString(s) => {
            let bytes = pad_to_8(s.as_bytes().to_vec());
            (bytes.len() as i64, bytes)
        }
        TagValue::WideString(s) => {
            let bytes = pad_to_8(s.encode_utf16().flat_map(u16::to_le_bytes).collect());
            (bytes.len() as i64, bytes)
        }
        TagValue::BinaryBlob(bytes) => (bytes.len() as i64, bytes.clone()),
    };

    out.extend_from_slice(&padded(tag.name.as_bytes(), TAG_NAME_SIZE));
    out.extend_from_slice(&tag.index.to_le_bytes());
    out.extend_from_slice(&tag.tag_type().code().to_le_bytes());
    out.extend_from_slice(&raw.to_le_bytes());
    out.extend_from_slice(&payload);
}
