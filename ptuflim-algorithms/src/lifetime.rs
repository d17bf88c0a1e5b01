//! Lifetime helpers: reference phasors, lifetime estimates, synthetic
//! decays and fast-FLIM mean arrival times.
//!
//! Times are in nanoseconds and frequencies in MHz throughout.

use ndarray::{Array1, Array2, Axis};
use ptuflim_core::{Error, FlimHistogram, Result};
use std::f64::consts::PI;
use std::ops::Range;

/// Angular frequency in rad/ns for a laser frequency in MHz.
#[inline]
fn omega(frequency_mhz: f64, harmonic: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let h = harmonic as f64;
    2.0 * PI * frequency_mhz * 1e-3 * h
}

/// Phasor coordinates of a mono-exponential decay.
///
/// Returns `(g, s)` on the universal semicircle:
/// `g = 1 / (1 + (w tau)^2)`, `s = w tau / (1 + (w tau)^2)`.
#[must_use]
pub fn phasor_from_lifetime(tau_ns: f64, frequency_mhz: f64, harmonic: usize) -> (f64, f64) {
    let wt = omega(frequency_mhz, harmonic) * tau_ns;
    let denom = 1.0 + wt * wt;
    (1.0 / denom, wt / denom)
}

/// Phase and modulation lifetimes (ns) of a phasor.
///
/// Both agree for points on the semicircle. Returns NaN for points where a
/// lifetime is undefined (e.g. `g <= 0` for the phase lifetime).
#[must_use]
pub fn lifetime_from_phasor(g: f64, s: f64, frequency_mhz: f64, harmonic: usize) -> (f64, f64) {
    let w = omega(frequency_mhz, harmonic);
    let tau_phase = if g > 0.0 { s / (g * w) } else { f64::NAN };
    let m2 = g * g + s * s;
    let tau_mod = if m2 > 0.0 && m2 <= 1.0 {
        (1.0 / m2 - 1.0).sqrt() / w
    } else {
        f64::NAN
    };
    (tau_phase, tau_mod)
}

/// Sample times (ns) of `n_points` equal bins covering one laser period.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn time_array(frequency_mhz: f64, n_points: usize) -> Array1<f64> {
    let period_ns = 1e3 / frequency_mhz;
    let step = period_ns / n_points as f64;
    Array1::from_iter((0..n_points).map(|i| i as f64 * step))
}

/// Mono-exponential decay `amplitude * exp(-t / tau)` sampled at `times`.
#[must_use]
pub fn synthetic_decay(times: &Array1<f64>, amplitude: f64, tau_ns: f64) -> Array1<f64> {
    times.mapv(|t| amplitude * (-t / tau_ns).exp())
}

/// Fast-FLIM image: intensity-weighted mean arrival time per pixel for one
/// channel, over the microtime bins in `gate`.
///
/// `resolution_ns` is the microtime bin width. Pixels without counts in the
/// gate are NaN. The gate end is clipped to the number of bins.
///
/// # Errors
/// - [`Error::ShapeMismatch`] if `channel` is out of range.
/// - [`Error::EmptyInput`] if the gate selects no bins.
#[allow(clippy::cast_precision_loss)]
pub fn mean_arrival_time(
    histogram: &FlimHistogram,
    channel: usize,
    gate: Range<usize>,
    resolution_ns: f64,
) -> Result<Array2<f64>> {
    if channel >= histogram.channels() {
        return Err(Error::ShapeMismatch {
            expected: format!("channel < {}", histogram.channels()),
            actual: format!("channel {channel}"),
        });
    }
    let gate = gate.start..gate.end.min(histogram.bins());
    if gate.is_empty() {
        return Err(Error::EmptyInput("microtime gate"));
    }

    let decays = histogram.view().index_axis_move(Axis(2), channel);
    let image = decays.map_axis(Axis(2), |lane| {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for bin in gate.clone() {
            let counts = f64::from(lane[bin]);
            weighted += counts * bin as f64;
            total += counts;
        }
        if total > 0.0 {
            weighted * resolution_ns / total
        } else {
            f64::NAN
        }
    });
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_phasor_lifetime_round_trip() {
        for tau in [0.5, 1.0, 2.5, 4.0] {
            let (g, s) = phasor_from_lifetime(tau, 80.0, 1);
            // On the semicircle centred at (0.5, 0).
            assert_relative_eq!((g - 0.5).powi(2) + s * s, 0.25, epsilon = 1e-12);

            let (tau_phase, tau_mod) = lifetime_from_phasor(g, s, 80.0, 1);
            assert_relative_eq!(tau_phase, tau, epsilon = 1e-9);
            assert_relative_eq!(tau_mod, tau, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_lifetime() {
        assert_eq!(phasor_from_lifetime(0.0, 40.0, 1), (1.0, 0.0));
        assert!(lifetime_from_phasor(0.0, 0.0, 40.0, 1).0.is_nan());
    }

    #[test]
    fn test_time_array() {
        let t = time_array(40.0, 4);
        assert_eq!(t.len(), 4);
        assert_relative_eq!(t[1], 6.25);
        assert_relative_eq!(t[3], 18.75);
    }

    #[test]
    fn test_synthetic_decay() {
        let t = time_array(80.0, 100);
        let decay = synthetic_decay(&t, 10.0, 2.0);
        assert_relative_eq!(decay[0], 10.0);
        assert!(decay.windows(2).into_iter().all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_mean_arrival_time() {
        let mut hist = FlimHistogram::new(1, 2, 1, 8);
        hist.increment(0, 0, 0, 2);
        hist.increment(0, 0, 0, 4);
        let image = mean_arrival_time(&hist, 0, 0..8, 0.5).unwrap();
        assert_relative_eq!(image[[0, 0]], 1.5);
        assert!(image[[0, 1]].is_nan());

        // Gate excludes bin 4.
        let gated = mean_arrival_time(&hist, 0, 0..3, 0.5).unwrap();
        assert_relative_eq!(gated[[0, 0]], 1.0);

        assert!(mean_arrival_time(&hist, 1, 0..8, 0.5).is_err());
        assert!(mean_arrival_time(&hist, 0, 8..10, 0.5).is_err());
    }
}
