//! ptuflim-core: Core types for FLIM data processing.
//!
//! This crate provides the foundational types shared by the PTU decoder,
//! the frame assembler and the phasor transform: decoded event batches,
//! imaging parameters, the 4D FLIM histogram and phasor images.
//!

pub mod error;
pub mod event;
pub mod histogram;
pub mod phasor;
pub mod soa;

pub use error::{Error, Result};
pub use event::{DecodedEvent, ImagingParams, Markers, ScannerKind};
pub use histogram::FlimHistogram;
pub use phasor::PhasorImage;
pub use soa::EventBatch;
