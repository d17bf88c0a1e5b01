use approx::assert_abs_diff_eq;
use ndarray::Array3;
use ptuflim_algorithms::{
    phasor_from_lifetime, phasor_transform, synthetic_decay, time_array, FrameAssembler,
};
use ptuflim_core::{DecodedEvent, EventBatch, ImagingParams, Markers, ScannerKind};

/// Small deterministic generator for reproducible streams.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

fn imaging(pixels_x: usize, pixels_y: usize) -> ImagingParams {
    ImagingParams {
        pixels_x,
        pixels_y,
        markers: Markers::default(),
        scanner: ScannerKind::Lsm,
        measurement_submode: 3,
        microtime_resolution_s: 25e-12,
        sync_period_s: 12.5e-9,
    }
}

#[test]
fn test_histogram_total_matches_photons_in_windows() {
    const PIX_X: u64 = 4;
    const LINES: u64 = 20;
    let markers = Markers::default();
    let mut rng = Lcg(42);
    let mut events = Vec::new();
    let mut expected_binned = 0u64;
    let mut expected_outside = 0u64;
    let mut photon_index = 0u64;
    let mut t = 1_000u64;

    let mut photon = |events: &mut Vec<DecodedEvent>, sync: u64| {
        let microtime = u16::try_from(photon_index % 16).unwrap();
        let channel = u8::try_from(photon_index % 2).unwrap();
        photon_index += 1;
        events.push(DecodedEvent::photon(sync, microtime, channel));
    };

    for k in 0..LINES {
        // Line spans jitter between 127 and 129 sync pulses.
        let span = 127 + k % 3;
        events.push(DecodedEvent::marker(t, markers.line_start));
        for _ in 0..rng.next(12) {
            let offset = rng.next(span);
            photon(&mut events, t + offset);
            // Mean span over lines 10.. is 128.
            if offset * PIX_X / 128 < PIX_X {
                expected_binned += 1;
            }
        }
        events.push(DecodedEvent::marker(t + span, markers.line_stop));
        for _ in 0..rng.next(3) {
            photon(&mut events, t + span + 1 + rng.next(20));
            expected_outside += 1;
        }
        t += span + 25;
    }
    events.push(DecodedEvent::marker(t, markers.frame));
    // Ensure every microtime value occurs so none is out of range.
    for _ in 0..16 {
        photon(&mut events, t + 100);
    }
    events.sort_by_key(|e| e.sync);
    let batch: EventBatch = events.into_iter().collect();

    let assembler = FrameAssembler::new(imaging(4, 20));
    let span = assembler.sync_pulses_per_line(&batch).unwrap();
    assert_abs_diff_eq!(span, 128.0);

    let (hist, stats) = assembler.assemble(&batch).unwrap();
    assert_eq!(hist.shape(), [20, 4, 4, 16]);
    assert_eq!(hist.total(), expected_binned);
    assert_eq!(stats.photons_binned, expected_binned);
    assert_eq!(stats.photons_outside, expected_outside);
    assert_eq!(stats.trailing_events, 16);
    assert_eq!(stats.lines, 20);
}

#[test]
fn test_mono_exponential_phasors_lie_on_semicircle() {
    let frequency_mhz = 80.0;
    let bins = 256;
    let times = time_array(frequency_mhz, bins);
    let taus = [0.5, 1.0, 2.0, 4.0];

    let mut data = Array3::<f64>::zeros((1, taus.len(), bins));
    for (i, &tau) in taus.iter().enumerate() {
        let decay = synthetic_decay(&times, 1000.0, tau);
        data.slice_mut(ndarray::s![0, i, ..]).assign(&decay);
    }

    for harmonic in [1, 2] {
        let image = phasor_transform(&data, harmonic).unwrap();
        assert_eq!(image.shape(), &[1, taus.len()]);
        for (i, &tau) in taus.iter().enumerate() {
            let g = image.g[[0, i]];
            let s = image.s[[0, i]];
            assert!(g * g + s * s <= 1.0 + 1e-12);
            assert!(s > 0.0);

            let (g_ref, s_ref) = phasor_from_lifetime(tau, frequency_mhz, harmonic);
            assert_abs_diff_eq!(g, g_ref, epsilon = 0.03);
            assert_abs_diff_eq!(s, s_ref, epsilon = 0.03);
        }
    }
}

#[test]
fn test_phasor_of_assembled_histogram() {
    // One pixel, photons spread over a decaying microtime distribution.
    let markers = Markers::default();
    let mut events = vec![DecodedEvent::marker(0, markers.line_start)];
    let mut sync = 1;
    for bin in 0..32u16 {
        let count = 64 >> (bin / 4);
        for _ in 0..count.max(1) {
            events.push(DecodedEvent::photon(sync, bin, 0));
            sync += 1;
        }
    }
    events.push(DecodedEvent::marker(sync, markers.line_stop));
    events.push(DecodedEvent::marker(sync + 1, markers.frame));
    let batch: EventBatch = events.into_iter().collect();

    let (hist, _) = FrameAssembler::new(imaging(1, 1)).assemble(&batch).unwrap();
    let image = ptuflim_algorithms::histogram_phasor(&hist, 1).unwrap();
    let g = image.g[[0, 0, 0]];
    let s = image.s[[0, 0, 0]];
    assert!(g > 0.0 && s > 0.0);
    assert!(g * g + s * s <= 1.0);
}
