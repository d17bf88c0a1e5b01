//! Phasor transform along the microtime axis.
//!
//! For every decay lane `x[0..n]` the transform evaluates the DFT
//! `F[k] = sum x[t] * exp(-2 pi i k t / n)` at `k = 0` and `k = h` and
//! reports `G = Re F[h] / DC`, `S = -Im F[h] / DC` with `DC = Re F[0]`.

use ndarray::{ArrayBase, ArrayD, ArrayView1, Axis, Data, Dimension, IxDyn};
use num_complex::Complex;
use ptuflim_core::{Error, FlimHistogram, PhasorImage, Result};
use rayon::prelude::*;
use rustfft::FftPlanner;

/// Raw harmonic components of one lane.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LaneComponents {
    dc: f64,
    re: f64,
    im: f64,
}

/// Computes the phasor image of `data`, whose last axis is microtime.
///
/// Lanes with a DC of exactly zero use the mean DC of all lanes instead,
/// so empty pixels map to the origin rather than NaN. If every lane is
/// empty the mean is zero and the result is NaN.
///
/// # Errors
/// - [`Error::ShapeMismatch`] for zero-dimensional input.
/// - [`Error::InvalidHarmonic`] unless `1 <= harmonic < bins`.
pub fn phasor_transform<A, S, D>(data: &ArrayBase<S, D>, harmonic: usize) -> Result<PhasorImage>
where
    A: Copy + Into<f64> + Sync,
    S: Data<Elem = A>,
    D: Dimension,
{
    let shape = data.shape();
    let Some((&bins, spatial)) = shape.split_last() else {
        return Err(Error::ShapeMismatch {
            expected: "at least one axis (microtime last)".into(),
            actual: "0-dimensional array".into(),
        });
    };
    if harmonic == 0 || harmonic >= bins {
        return Err(Error::InvalidHarmonic { harmonic, bins });
    }

    // Lanes come out in logical (row-major) order of the leading axes,
    // whatever the memory layout. Each lane is converted straight into the
    // FFT buffer so the input is never copied as a whole.
    let views: Vec<ArrayView1<'_, A>> = data.lanes(Axis(shape.len() - 1)).into_iter().collect();

    let fft = FftPlanner::<f64>::new().plan_fft_forward(bins);
    let lanes: Vec<LaneComponents> = views
        .par_iter()
        .map_init(
            || vec![Complex::new(0.0, 0.0); bins],
            |buf, lane| {
                for (slot, &x) in buf.iter_mut().zip(lane) {
                    *slot = Complex::new(x.into(), 0.0);
                }
                fft.process(buf);
                LaneComponents {
                    dc: buf[0].re,
                    re: buf[harmonic].re,
                    im: buf[harmonic].im,
                }
            },
        )
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let mean_dc = if lanes.is_empty() {
        0.0
    } else {
        lanes.iter().map(|l| l.dc).sum::<f64>() / lanes.len() as f64
    };

    let mut g = Vec::with_capacity(lanes.len());
    let mut s = Vec::with_capacity(lanes.len());
    let mut dc = Vec::with_capacity(lanes.len());
    for lane in &lanes {
        let d = if lane.dc == 0.0 { mean_dc } else { lane.dc };
        g.push(lane.re / d);
        s.push(-lane.im / d);
        dc.push(d);
    }

    log::debug!(
        "phasor transform: {} lanes of {bins} bins, harmonic {harmonic}",
        lanes.len()
    );

    Ok(PhasorImage {
        g: to_spatial(spatial, g)?,
        s: to_spatial(spatial, s)?,
        dc: to_spatial(spatial, dc)?,
        harmonic,
    })
}

/// Phasor image of a FLIM histogram, shape `[rows, cols, channels]`.
///
/// # Errors
/// [`Error::InvalidHarmonic`] unless `1 <= harmonic < bins`.
pub fn histogram_phasor(histogram: &FlimHistogram, harmonic: usize) -> Result<PhasorImage> {
    phasor_transform(histogram.as_array(), harmonic)
}

fn to_spatial(shape: &[usize], values: Vec<f64>) -> Result<ArrayD<f64>> {
    let len = values.len();
    ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|_| Error::ShapeMismatch {
        expected: format!("{shape:?}"),
        actual: format!("{len} values"),
    })
}
