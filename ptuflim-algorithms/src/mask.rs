//! Intensity images, threshold and time masks, and median filtering of
//! phasor images.

use ndarray::{Array1, Array2, Array3, ArrayBase, ArrayD, Axis, Data, Dimension, IxDyn, Zip};
use ptuflim_core::{Error, FlimHistogram, PhasorImage, Result};

/// Photon counts per pixel, summed over channels and microtime.
#[must_use]
pub fn intensity_image(histogram: &FlimHistogram) -> Array2<u64> {
    histogram.intensity_image()
}

/// Pixels whose summed intensity is at least `threshold`.
#[must_use]
pub fn intensity_mask(histogram: &FlimHistogram, threshold: u64) -> Array2<bool> {
    histogram.intensity_image().mapv(|counts| counts >= threshold)
}

/// Sets `g` and `s` to NaN for every pixel outside `mask`.
///
/// The phasor image must have the shape of a histogram phasor,
/// `[rows, cols, channels]`; `mask` is `[rows, cols]`.
///
/// # Errors
/// [`Error::ShapeMismatch`] if the leading axes disagree.
pub fn apply_mask(image: &mut PhasorImage, mask: &Array2<bool>) -> Result<()> {
    let shape = image.shape().to_vec();
    if shape.len() != 3 || shape[..2] != *mask.shape() {
        return Err(Error::ShapeMismatch {
            expected: format!("[{}, {}, channels]", mask.nrows(), mask.ncols()),
            actual: format!("{shape:?}"),
        });
    }

    let keep = mask.view().into_dyn();
    Zip::from(image.g.lanes_mut(Axis(2)))
        .and(image.s.lanes_mut(Axis(2)))
        .and(&keep)
        .for_each(|mut g, mut s, &keep| {
            if !keep {
                g.fill(f64::NAN);
                s.fill(f64::NAN);
            }
        });
    Ok(())
}

/// Microtime bins from the most common decay peak onwards.
///
/// The peak bin of every lane along the last axis is counted, the last bin
/// sharing its count with the one before it. The start is the most frequent
/// peak bin other than bin 0 (the earliest on ties), so rising edges and
/// empty pixels do not move it.
///
/// # Errors
/// [`Error::ShapeMismatch`] for zero-dimensional input or fewer than three
/// microtime bins.
pub fn time_mask<A, S, D>(data: &ArrayBase<S, D>) -> Result<Array1<bool>>
where
    A: Copy + PartialOrd,
    S: Data<Elem = A>,
    D: Dimension,
{
    let bins = data.shape().last().copied().unwrap_or(0);
    if bins < 3 {
        return Err(Error::ShapeMismatch {
            expected: "at least 3 microtime bins on the last axis".into(),
            actual: format!("{:?}", data.shape()),
        });
    }

    let mut peaks = vec![0usize; bins - 1];
    for lane in data.lanes(Axis(data.ndim() - 1)) {
        let mut peak = 0;
        for (t, &v) in lane.iter().enumerate() {
            if v > lane[peak] {
                peak = t;
            }
        }
        peaks[peak.min(bins - 2)] += 1;
    }

    let mut start = 1;
    for (t, &count) in peaks.iter().enumerate().skip(2) {
        if count > peaks[start] {
            start = t;
        }
    }
    log::debug!("time mask starts at bin {start} of {bins}");
    Ok(Array1::from_shape_fn(bins, |t| t >= start))
}

/// Copy of `histogram` with every microtime bin outside `mask` zeroed.
///
/// # Errors
/// [`Error::ShapeMismatch`] if `mask` does not have one entry per bin.
pub fn apply_time_mask(histogram: &FlimHistogram, mask: &Array1<bool>) -> Result<FlimHistogram> {
    if mask.len() != histogram.bins() {
        return Err(Error::ShapeMismatch {
            expected: format!("{} microtime bins", histogram.bins()),
            actual: format!("mask of {}", mask.len()),
        });
    }
    let mut data = histogram.as_array().clone();
    for (t, &keep) in mask.iter().enumerate() {
        if !keep {
            data.index_axis_mut(Axis(3), t).fill(0);
        }
    }
    Ok(FlimHistogram::from_array(data))
}

/// 3x3 median over the first two axes, repeated `iterations` times.
///
/// Every index of the trailing axes is an independent `[rows, cols]` plane.
/// Borders repeat the nearest pixel. NaN sorts above every number.
///
/// # Errors
/// [`Error::ShapeMismatch`] for input with fewer than two axes.
pub fn median_filter(values: &ArrayD<f64>, iterations: usize) -> Result<ArrayD<f64>> {
    let shape = values.shape().to_vec();
    if shape.len() < 2 {
        return Err(Error::ShapeMismatch {
            expected: "[rows, cols, ...]".into(),
            actual: format!("{shape:?}"),
        });
    }
    if iterations == 0 {
        return Ok(values.clone());
    }

    let (rows, cols) = (shape[0], shape[1]);
    let planes = shape[2..].iter().product::<usize>();
    let mismatch = |_| Error::ShapeMismatch {
        expected: format!("{shape:?}"),
        actual: format!("{} values", values.len()),
    };

    let mut data = Array3::from_shape_vec((rows, cols, planes), values.iter().copied().collect())
        .map_err(mismatch)?;
    for _ in 0..iterations {
        data = median3x3(&data);
    }
    ArrayD::from_shape_vec(IxDyn(&shape), data.iter().copied().collect()).map_err(mismatch)
}

fn median3x3(data: &Array3<f64>) -> Array3<f64> {
    let (rows, cols, _) = data.dim();
    Array3::from_shape_fn(data.dim(), |(r, c, k)| {
        let near_rows = [r.saturating_sub(1), r, (r + 1).min(rows - 1)];
        let near_cols = [c.saturating_sub(1), c, (c + 1).min(cols - 1)];
        let mut window = [0.0; 9];
        for (i, &rr) in near_rows.iter().enumerate() {
            for (j, &cc) in near_cols.iter().enumerate() {
                window[i * 3 + j] = data[[rr, cc, k]];
            }
        }
        window.sort_unstable_by(f64::total_cmp);
        window[4]
    })
}

/// Median-filtered copy of a phasor image: `g` and `s` are filtered,
/// `dc` is kept.
///
/// # Errors
/// [`Error::ShapeMismatch`] if the image has fewer than two axes.
pub fn apply_median_filter(image: &PhasorImage, iterations: usize) -> Result<PhasorImage> {
    Ok(PhasorImage {
        g: median_filter(&image.g, iterations)?,
        s: median_filter(&image.s, iterations)?,
        dc: image.dc.clone(),
        harmonic: image.harmonic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phasor::histogram_phasor;

    fn sample() -> FlimHistogram {
        let mut hist = FlimHistogram::new(2, 2, 1, 4);
        for _ in 0..5 {
            hist.increment(0, 0, 0, 1);
        }
        hist.increment(1, 1, 0, 2);
        hist
    }

    #[test]
    fn test_intensity_mask() {
        let hist = sample();
        assert_eq!(intensity_image(&hist)[[0, 0]], 5);

        let mask = intensity_mask(&hist, 2);
        assert!(mask[[0, 0]]);
        assert!(!mask[[1, 1]]);
        assert!(!mask[[0, 1]]);

        assert!(intensity_mask(&hist, 0).iter().all(|&m| m));
    }

    #[test]
    fn test_apply_mask() {
        let hist = sample();
        let mut image = histogram_phasor(&hist, 1).unwrap();
        apply_mask(&mut image, &intensity_mask(&hist, 2)).unwrap();

        assert!(!image.g[[0, 0, 0]].is_nan());
        assert!(image.g[[1, 1, 0]].is_nan());
        assert!(image.s[[0, 1, 0]].is_nan());

        let wrong = Array2::from_elem((3, 2), true);
        assert!(apply_mask(&mut image, &wrong).is_err());
    }

    fn plane(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> ArrayD<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)).into_dyn()
    }

    #[test]
    fn test_median_filter_zero_iterations() {
        let values = plane(3, 4, |r, c| (r * 7 + c * 3) as f64);
        assert_eq!(median_filter(&values, 0).unwrap(), values);
    }

    #[test]
    fn test_median_filter_removes_outlier() {
        let values = plane(3, 3, |r, c| if (r, c) == (1, 1) { 100.0 } else { 1.0 });
        let filtered = median_filter(&values, 1).unwrap();
        assert!(filtered.iter().all(|&v| (v - 1.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_median_filter_keeps_ramp_at_borders() {
        let values = plane(4, 5, |_, c| c as f64);
        assert_eq!(median_filter(&values, 3).unwrap(), values);
    }

    #[test]
    fn test_median_filter_planes_independent() {
        let values = ndarray::Array3::from_shape_fn((3, 3, 2), |(r, c, k)| {
            if k == 0 && (r, c) == (0, 2) {
                -50.0
            } else {
                (k * 10) as f64
            }
        })
        .into_dyn();
        let filtered = median_filter(&values, 1).unwrap();
        assert_eq!(filtered.shape(), &[3, 3, 2]);
        assert!((filtered[[0, 2, 0]]).abs() < f64::EPSILON);
        assert!((filtered[[0, 2, 1]] - 10.0).abs() < f64::EPSILON);

        let flat = ndarray::Array1::<f64>::zeros(4).into_dyn();
        assert!(median_filter(&flat, 1).is_err());
    }

    #[test]
    fn test_apply_median_filter_keeps_dc() {
        let mut hist = sample();
        hist.increment(0, 1, 0, 3);
        let image = histogram_phasor(&hist, 1).unwrap();
        let filtered = apply_median_filter(&image, 1).unwrap();
        assert_eq!(filtered.dc, image.dc);
        assert_eq!(filtered.harmonic, 1);
        assert_eq!(filtered.shape(), image.shape());
    }

    /// One decay lane per entry, peaking at the given bin.
    fn decays_peaking_at(peaks: &[usize], bins: usize) -> Array2<u32> {
        Array2::from_shape_fn((peaks.len(), bins), |(i, t)| if t == peaks[i] { 9 } else { 1 })
    }

    #[test]
    fn test_time_mask_most_common_peak() {
        let mask = time_mask(&decays_peaking_at(&[2, 2, 3, 0], 6)).unwrap();
        assert_eq!(mask.to_vec(), [false, false, true, true, true, true]);
    }

    #[test]
    fn test_time_mask_edges() {
        // A peak in the last bin counts towards the one before it.
        let mask = time_mask(&decays_peaking_at(&[3, 3], 4)).unwrap();
        assert_eq!(mask.to_vec(), [false, false, true, true]);

        // Peaks only in bin 0 leave every later bin in.
        let mask = time_mask(&decays_peaking_at(&[0, 0, 0], 4)).unwrap();
        assert_eq!(mask.to_vec(), [false, true, true, true]);

        // Ties go to the earliest bin.
        let mask = time_mask(&decays_peaking_at(&[1, 3], 5)).unwrap();
        assert_eq!(mask.to_vec(), [false, true, true, true, true]);

        assert!(time_mask(&decays_peaking_at(&[0], 2)).is_err());
    }

    #[test]
    fn test_apply_time_mask() {
        let hist = sample();
        let mask = ndarray::arr1(&[false, false, true, true]);
        let masked = apply_time_mask(&hist, &mask).unwrap();
        assert_eq!(masked.total(), 1);
        assert_eq!(masked.get(1, 1, 0, 2), Some(1));
        assert_eq!(masked.get(0, 0, 0, 1), Some(0));

        assert!(apply_time_mask(&hist, &ndarray::arr1(&[true])).is_err());
    }
}
