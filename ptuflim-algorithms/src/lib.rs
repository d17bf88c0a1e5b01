//! ptuflim-algorithms: FLIM image assembly and phasor analysis.
//!
//! This crate provides the analysis stages after decoding:
//! - **Frame assembly** - Line/frame marker state machine producing the
//!   4-D histogram `(row, column, channel, microtime)`
//! - **Phasor transform** - Per-pixel harmonic components (G, S, DC)
//! - **Lifetime helpers** - Reference phasors, lifetime estimates,
//!   synthetic decays, fast-FLIM mean arrival time
//! - **Masks and filters** - Intensity and time masks, median filtering
//!   of phasor images
//!
#![warn(missing_docs)]

mod assembler;
mod config;
pub mod lifetime;
pub mod mask;
mod phasor;

pub use assembler::{AssemblerState, AssemblyStats, FrameAssembler, FrameState, LineState};
pub use config::{AnalysisConfig, AssemblerConfig, PhasorConfig};
pub use lifetime::{
    lifetime_from_phasor, mean_arrival_time, phasor_from_lifetime, synthetic_decay, time_array,
};
pub use mask::{
    apply_mask, apply_median_filter, apply_time_mask, intensity_image, intensity_mask,
    median_filter, time_mask,
};
pub use phasor::{histogram_phasor, phasor_transform};

// Re-export core types used in signatures
pub use ptuflim_core::{FlimHistogram, ImagingParams, PhasorImage};
