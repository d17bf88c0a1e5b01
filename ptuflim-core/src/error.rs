//! Error types for ptuflim-core.

use thiserror::Error;

/// Result type alias for ptuflim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for ptuflim operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The acquisition is not a scanned FLIM image this decoder can assemble.
    #[error("not FLIM image data: {0}")]
    NotFlimData(String),

    /// Harmonic index outside `1..microtime_bins`.
    #[error("invalid harmonic {harmonic} for {bins} microtime bins")]
    InvalidHarmonic { harmonic: usize, bins: usize },

    /// Array shapes that must agree do not.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// An operation that needs data received none.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
}
