//! FLIM histogram storage.
//!
//! [`FlimHistogram`] stores photon counts in a 4D array indexed by
//! `[row, column, channel, microtime_bin]`.

use ndarray::{Array2, Array4, ArrayView4, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 4D histogram of photon counts indexed by (row, column, channel, bin).
///
/// # Memory Layout
///
/// Row-major (`ndarray` standard layout), so each pixel's microtime decay
/// is a contiguous lane. A 512 × 512 image with 2 channels and 4096 bins
/// takes 8 GiB of `u32` counts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlimHistogram {
    data: Array4<u32>,
}

impl FlimHistogram {
    /// Create an empty histogram.
    #[must_use]
    pub fn new(rows: usize, cols: usize, channels: usize, bins: usize) -> Self {
        Self {
            data: Array4::zeros((rows, cols, channels, bins)),
        }
    }

    /// Wrap an existing count array.
    #[must_use]
    pub fn from_array(data: Array4<u32>) -> Self {
        Self { data }
    }

    /// Number of image rows (lines).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.shape()[0]
    }

    /// Number of image columns (pixels per line).
    #[must_use]
    pub fn cols(&self) -> usize {
        self.data.shape()[1]
    }

    /// Number of detector channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.data.shape()[2]
    }

    /// Number of microtime bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.data.shape()[3]
    }

    /// Shape as `[rows, cols, channels, bins]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 4] {
        [self.rows(), self.cols(), self.channels(), self.bins()]
    }

    /// Add one count. Returns `false` (and changes nothing) when any index
    /// is out of range.
    #[inline]
    pub fn increment(&mut self, row: usize, col: usize, channel: usize, bin: usize) -> bool {
        match self.data.get_mut((row, col, channel, bin)) {
            Some(count) => {
                *count = count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Count at a position, or `None` when out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize, channel: usize, bin: usize) -> Option<u32> {
        self.data.get((row, col, channel, bin)).copied()
    }

    /// Total number of counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.data.iter().map(|&c| u64::from(c)).sum()
    }

    /// Summed intensity image `[rows, cols]` over channels and bins.
    #[must_use]
    pub fn intensity_image(&self) -> Array2<u64> {
        self.data
            .map(|&c| u64::from(c))
            .sum_axis(Axis(3))
            .sum_axis(Axis(2))
    }

    /// Borrow the counts.
    #[must_use]
    pub fn view(&self) -> ArrayView4<'_, u32> {
        self.data.view()
    }

    /// Borrow the underlying array.
    #[must_use]
    pub fn as_array(&self) -> &Array4<u32> {
        &self.data
    }

    /// Take the underlying array.
    #[must_use]
    pub fn into_array(self) -> Array4<u32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_increment_and_bounds() {
        let mut hist = FlimHistogram::new(2, 3, 1, 4);
        assert_eq!(hist.shape(), [2, 3, 1, 4]);

        assert!(hist.increment(1, 2, 0, 3));
        assert!(hist.increment(1, 2, 0, 3));
        assert!(!hist.increment(2, 0, 0, 0));
        assert!(!hist.increment(0, 0, 1, 0));

        assert_eq!(hist.get(1, 2, 0, 3), Some(2));
        assert_eq!(hist.get(5, 0, 0, 0), None);
        assert_eq!(hist.total(), 2);
    }

    #[test]
    fn test_intensity_image() {
        let mut hist = FlimHistogram::new(2, 2, 2, 3);
        hist.increment(0, 0, 0, 0);
        hist.increment(0, 0, 1, 2);
        hist.increment(1, 1, 0, 1);

        let img = hist.intensity_image();
        assert_eq!(img.shape(), &[2, 2]);
        assert_eq!(img[[0, 0]], 2);
        assert_eq!(img[[1, 1]], 1);
        assert_eq!(img[[0, 1]], 0);
    }
}
