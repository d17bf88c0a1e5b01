//! ptuflim-io: Memory-mapped PTU reading and FLIM output writers.
//!
//! This crate ties the decoding and analysis stages to files: PTU files
//! are memory mapped via memmap2, decoded, overflow corrected and
//! assembled into a histogram in one call ([`PtuFileReader::read_flim`]).
//!

mod config;
mod error;
mod reader;
mod writer;

pub use config::ProcessingConfig;
pub use error::{Error, Result};
pub use reader::{FlimData, MappedFileReader, PtuFileReader};
pub use writer::{sidecar_path, DataFileWriter};
