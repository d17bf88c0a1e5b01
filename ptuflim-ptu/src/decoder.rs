//! TTTR record decoder.

use crate::header::Header;
use crate::record::{RawRecord, RecordLayout, RecordType};
use crate::{Error, Result};
use ptuflim_core::EventBatch;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Size of one TTTR record in bytes.
pub const RECORD_SIZE: usize = 4;

/// Configuration for the record decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Whether to decode large inputs in parallel.
    pub parallel: bool,
    /// Records per parallel work item; inputs no larger than this decode
    /// sequentially.
    pub chunk_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            chunk_size: 1024 * 1024, // 1M records per chunk
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to use parallel decoding.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the chunk size for parallel decoding.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}

/// Decoded records before overflow correction.
///
/// `events.sync` holds the raw sync field of each record; for overflow
/// records in repeat-count mode that is the repeat count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    /// Record type the words were decoded as.
    pub record_type: RecordType,
    /// One row per input word.
    pub events: EventBatch,
    /// Overflow flag per row.
    pub overflow: Vec<bool>,
}

impl DecodeResult {
    /// Number of decoded records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of overflow records.
    #[must_use]
    pub fn overflow_count(&self) -> usize {
        self.overflow.iter().filter(|&&o| o).count()
    }

    fn from_records(record_type: RecordType, records: &[RawRecord]) -> Self {
        let mut events = EventBatch::with_capacity(records.len());
        let mut overflow = Vec::with_capacity(records.len());
        for rec in records {
            events.sync.push(u64::from(rec.sync));
            events.microtime.push(rec.microtime);
            events.channel.push(rec.channel);
            events.special.push(rec.special);
            overflow.push(rec.overflow);
        }
        Self {
            record_type,
            events,
            overflow,
        }
    }
}

/// Decodes 32-bit TTTR words into event columns.
#[derive(Debug, Clone, Default)]
pub struct RecordDecoder {
    config: DecoderConfig,
}

impl RecordDecoder {
    /// Creates a new decoder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new decoder with the given configuration.
    #[must_use]
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Returns the decoder configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes raw record words.
    #[must_use]
    pub fn decode_words(&self, record_type: RecordType, words: &[u32]) -> DecodeResult {
        let layout = record_type.layout();
        let records = if self.config.parallel && words.len() > self.config.chunk_size {
            Self::decode_parallel(layout, words, self.config.chunk_size)
        } else {
            words.iter().map(|&w| layout.decode(w)).collect()
        };
        DecodeResult::from_records(record_type, &records)
    }

    fn decode_parallel(layout: RecordLayout, words: &[u32], chunk_size: usize) -> Vec<RawRecord> {
        words
            .par_chunks(chunk_size)
            .flat_map_iter(|chunk| chunk.iter().map(move |&w| layout.decode(w)))
            .collect()
    }

    /// Decodes little-endian record bytes.
    ///
    /// # Errors
    /// [`Error::TruncatedRecords`] if the length is not a multiple of 4.
    pub fn decode_bytes(&self, record_type: RecordType, data: &[u8]) -> Result<DecodeResult> {
        if data.len() % RECORD_SIZE != 0 {
            return Err(Error::TruncatedRecords {
                expected: data.len().div_ceil(RECORD_SIZE),
                available: data.len() / RECORD_SIZE,
            });
        }
        Ok(self.decode_words(record_type, &words_from_le_bytes(data)))
    }

    /// Decodes the records of a whole PTU file.
    ///
    /// `file` is the complete file content; `header` must have been parsed
    /// from it. Exactly `TTResult_NumberOfRecords` records are read from the
    /// header's data offset; trailing bytes are ignored.
    ///
    /// # Errors
    /// Header tag errors, [`Error::UnsupportedHardware`], or
    /// [`Error::TruncatedRecords`] when the file is too short.
    pub fn decode_records(&self, header: &Header, file: &[u8]) -> Result<DecodeResult> {
        let record_type = header.record_type()?;
        let expected = header.record_count()?;
        let body = file.get(header.data_offset()..).unwrap_or_default();
        let available = body.len() / RECORD_SIZE;
        if available < expected {
            return Err(Error::TruncatedRecords {
                expected,
                available,
            });
        }
        if available > expected {
            log::warn!(
                "{} trailing bytes after {expected} records ignored",
                body.len() - expected * RECORD_SIZE
            );
        }

        let result = self.decode_bytes(record_type, &body[..expected * RECORD_SIZE])?;
        log::debug!(
            "decoded {} {record_type} records ({} overflows)",
            result.len(),
            result.overflow_count()
        );
        Ok(result)
    }
}

/// Reinterprets little-endian bytes as record words. Trailing bytes that do
/// not fill a word are ignored.
#[must_use]
pub fn words_from_le_bytes(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let mut buf = [0u8; RECORD_SIZE];
            buf.copy_from_slice(chunk);
            u32::from_le_bytes(buf)
        })
        .collect()
}
