//! ptuflim-ptu: PicoQuant PTU header parser, TTTR record decoder and
//! overflow correction.
//!
//! # Key Components
//!
//! - [`Header`] - Tagged header parser and encoder ([`HeaderBuilder`])
//! - [`RecordType`] / [`RecordLayout`] - Record type table and bit layouts
//! - [`RecordDecoder`] - Word decoder producing a [`DecodeResult`]
//! - [`correct_overflows`] - Sync counter wraparound correction
//!
//! # Processing Pipeline
//!
//! 1. Parse the header and find the data offset
//! 2. Decode `TTResult_NumberOfRecords` words (parallel for large files)
//! 3. Remove overflow records and extend the sync counter

mod error;
pub mod decoder;
pub mod header;
pub mod overflow;
pub mod record;
pub mod tag;

pub use decoder::{words_from_le_bytes, DecodeResult, DecoderConfig, RecordDecoder};
pub use error::{Error, Result};
pub use header::{tags, Header, HeaderBuilder, HEADER_END, PTU_MAGIC};
pub use overflow::{correct_overflows, OverflowStats};
pub use record::{OverflowMode, RawRecord, RecordLayout, RecordType};
pub use tag::{format_tdatetime, HeaderTag, TagType, TagValue};

// Re-export core types for convenience
pub use ptuflim_core::{DecodedEvent, EventBatch, ImagingParams};

/// Parses the header, decodes all records and applies overflow correction.
///
/// # Errors
/// Any header, record type or truncation error.
pub fn decode_file(
    file: &[u8],
    config: &DecoderConfig,
) -> Result<(Header, EventBatch, OverflowStats)> {
    let header = Header::parse(file)?;
    let decoded = RecordDecoder::with_config(config.clone()).decode_records(&header, file)?;
    let (events, stats) = correct_overflows(&decoded)?;
    Ok((header, events, stats))
}
