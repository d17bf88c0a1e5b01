//! Phasor image type.

use ndarray::ArrayD;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-pixel phasor coordinates.
///
/// `g`, `s` and `dc` share the spatial shape of the histogram they were
/// computed from (every axis except microtime).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhasorImage {
    /// Real part of the selected harmonic, normalised by `dc`.
    pub g: ArrayD<f64>,
    /// Negated imaginary part of the selected harmonic, normalised by `dc`.
    pub s: ArrayD<f64>,
    /// Zero-harmonic component (summed intensity, zeros replaced by the mean).
    pub dc: ArrayD<f64>,
    /// Harmonic the image was computed for.
    pub harmonic: usize,
}

impl PhasorImage {
    /// Spatial shape shared by `g`, `s` and `dc`.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.dc.shape()
    }

    /// Number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dc.len()
    }

    /// Returns true if the image has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dc.is_empty()
    }

    /// Iterate `(g, s, dc)` per pixel in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.g
            .iter()
            .zip(self.s.iter())
            .zip(self.dc.iter())
            .map(|((&g, &s), &dc)| (g, s, dc))
    }
}
