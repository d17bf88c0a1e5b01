//! Decoded event and imaging parameter types.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One decoded TTTR record after overflow correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecodedEvent {
    /// Global sync counter.
    pub sync: u64,
    /// Microtime (TCSPC) bin.
    pub microtime: u16,
    /// Detector channel.
    pub channel: u8,
    /// Marker bits; zero for photons.
    pub special: u8,
}

impl DecodedEvent {
    /// Creates a photon event.
    #[inline]
    #[must_use]
    pub fn photon(sync: u64, microtime: u16, channel: u8) -> Self {
        Self {
            sync,
            microtime,
            channel,
            special: 0,
        }
    }

    /// Creates a marker event. The marker bits are mirrored into the
    /// channel column the way the hardware records them.
    #[inline]
    #[must_use]
    pub fn marker(sync: u64, bits: u8) -> Self {
        Self {
            sync,
            microtime: 0,
            channel: bits,
            special: bits,
        }
    }

    /// Returns true for photon records.
    #[inline]
    #[must_use]
    pub fn is_photon(&self) -> bool {
        self.special == 0
    }
}

/// Marker values identifying frame and line events in the `special` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Markers {
    /// Line start marker value.
    pub line_start: u8,
    /// Line stop marker value.
    pub line_stop: u8,
    /// Frame marker value.
    pub frame: u8,
}

impl Markers {
    /// Builds marker values from the 1-based bit positions stored in the
    /// header (`ImgHdr_LineStart`, `ImgHdr_LineStop`, `ImgHdr_Frame`).
    ///
    /// Each value is `2^(bit - 1)`.
    ///
    /// # Errors
    /// Returns [`Error::NotFlimData`] if a bit position is outside `1..=8`.
    pub fn from_bits(line_start: i64, line_stop: i64, frame: i64) -> Result<Self> {
        Ok(Self {
            line_start: marker_value("ImgHdr_LineStart", line_start)?,
            line_stop: marker_value("ImgHdr_LineStop", line_stop)?,
            frame: marker_value("ImgHdr_Frame", frame)?,
        })
    }
}

impl Default for Markers {
    /// PicoQuant scanner defaults: line start on bit 1, stop on bit 2,
    /// frame on bit 3.
    fn default() -> Self {
        Self {
            line_start: 1,
            line_stop: 2,
            frame: 4,
        }
    }
}

fn marker_value(name: &str, bit: i64) -> Result<u8> {
    match u32::try_from(bit) {
        Ok(b @ 1..=8) => Ok(1u8 << (b - 1)),
        _ => Err(Error::NotFlimData(format!(
            "{name} bit position {bit} is outside 1..=8"
        ))),
    }
}

/// Scanner type codes stored in `ImgHdr_Ident`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScannerKind {
    /// PI E710 piezo scanner.
    PiezoE710,
    /// LSM (laser scanning microscope) with line/frame markers.
    Lsm,
    /// PI LSM piezo scanner.
    PiezoLsm,
    /// Generic line/frame marker scanner (e.g. FLIMbee, Zeiss LSM).
    MarkerDriven,
    /// Any other identifier.
    Other(i64),
}

impl ScannerKind {
    /// Maps an `ImgHdr_Ident` value to a scanner kind.
    #[must_use]
    pub fn from_ident(ident: i64) -> Self {
        match ident {
            1 => Self::PiezoE710,
            3 => Self::Lsm,
            5 => Self::PiezoLsm,
            9 => Self::MarkerDriven,
            other => Self::Other(other),
        }
    }

    /// Whether line/frame markers drive pixel attribution for this scanner.
    #[must_use]
    pub fn is_marker_driven(self) -> bool {
        matches!(self, Self::Lsm | Self::MarkerDriven)
    }
}

/// Header-derived parameters the frame assembler needs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImagingParams {
    /// Pixels per line (`ImgHdr_PixX`).
    pub pixels_x: usize,
    /// Lines per frame (`ImgHdr_PixY`).
    pub pixels_y: usize,
    /// Marker values.
    pub markers: Markers,
    /// Scanner identifier.
    pub scanner: ScannerKind,
    /// `Measurement_SubMode` (0 = point, 1 = line, 2 = image scan).
    pub measurement_submode: i64,
    /// Microtime bin width in seconds (`MeasDesc_Resolution`).
    pub microtime_resolution_s: f64,
    /// Sync period in seconds (`MeasDesc_GlobalResolution`).
    pub sync_period_s: f64,
}

impl ImagingParams {
    /// Rejects acquisitions the marker-driven assembler cannot handle.
    ///
    /// # Errors
    /// Returns [`Error::NotFlimData`] for point measurements, piezo scanners,
    /// unknown scanner identifiers and empty image dimensions.
    pub fn ensure_flim_image(&self) -> Result<()> {
        if self.measurement_submode == 0 {
            return Err(Error::NotFlimData(
                "point measurement (Measurement_SubMode = 0)".into(),
            ));
        }
        match self.scanner {
            ScannerKind::PiezoE710 | ScannerKind::PiezoLsm => {
                return Err(Error::NotFlimData(
                    "piezo scanner data is not supported".into(),
                ));
            }
            ScannerKind::Other(ident) => {
                return Err(Error::NotFlimData(format!(
                    "unsupported scanner identifier ImgHdr_Ident = {ident}"
                )));
            }
            ScannerKind::Lsm | ScannerKind::MarkerDriven => {}
        }
        if self.pixels_x == 0 || self.pixels_y == 0 {
            return Err(Error::NotFlimData(format!(
                "empty image dimensions {}x{}",
                self.pixels_x, self.pixels_y
            )));
        }
        Ok(())
    }

    /// Laser repetition frequency in MHz derived from the sync period.
    #[must_use]
    pub fn laser_frequency_mhz(&self) -> f64 {
        if self.sync_period_s > 0.0 {
            1e-6 / self.sync_period_s
        } else {
            0.0
        }
    }
}
