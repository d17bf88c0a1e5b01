//! PTU-specific error types.

use thiserror::Error;

/// Result type for PTU operations.
pub type Result<T> = std::result::Result<T, Error>;

/// PTU-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad magic or version preamble; the file is rejected outright.
    #[error("not a PTU file: {0}")]
    FormatError(String),

    /// Tag type code not in the tag type table.
    #[error("unsupported tag type {code:#010x} for tag '{name}'")]
    UnsupportedTagType { name: String, code: u32 },

    /// Header ended before `Header_End` or a payload ran past the end of file.
    #[error("truncated header at byte offset {offset}: {reason}")]
    TruncatedHeader { offset: usize, reason: String },

    /// Record type code not in the record type table.
    #[error("unsupported TTTR record type {0:#010x}")]
    UnsupportedHardware(u32),

    /// Fewer record bytes than `TTResult_NumberOfRecords` requires.
    #[error("truncated records: expected {expected} records, file holds {available}")]
    TruncatedRecords { expected: usize, available: usize },

    /// Corrected sync time no longer fits in 64 bits.
    #[error("sync counter overflows 64 bits at record {record}")]
    SyncOverflow { record: usize },

    /// Required header tag is absent.
    #[error("missing header tag '{0}'")]
    MissingTag(String),

    /// Header tag holds a value of the wrong type or range.
    #[error("invalid value for header tag '{name}': {reason}")]
    InvalidTagValue { name: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] ptuflim_core::Error),
}
