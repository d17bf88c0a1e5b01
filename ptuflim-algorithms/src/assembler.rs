//! Frame assembler: line/frame marker state machine building the FLIM
//! histogram.
//!
//! The scanner interleaves line start, line stop and frame markers with the
//! photon records. Photons are attributed to a row by counting line stops
//! since the last frame marker, and to a column by their sync distance from
//! the current line start relative to the mean line duration.
//!
//! Processing is strictly sequential: the row and scanning state of every
//! photon depends on all markers before it.

use crate::config::AssemblerConfig;
use ptuflim_core::{Error, EventBatch, FlimHistogram, ImagingParams, Markers, Result};

/// Whether the scanner is inside an image frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Before the first frame marker or after the last line of a frame.
    Outside,
    /// Between a frame marker and the end of that frame.
    Inside,
}

/// Whether the scanner is sweeping a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Between a line stop and the next line start (retrace).
    Idle,
    /// Between a line start and its line stop.
    Scanning,
}

/// Counters collected during assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Frame markers seen.
    pub frames: usize,
    /// Line stop markers seen.
    pub lines: usize,
    /// Photons added to the histogram.
    pub photons_binned: u64,
    /// Photons inside a line whose column, channel or microtime was out of
    /// range.
    pub photons_dropped: u64,
    /// Photons outside any frame or line (retrace, flyback).
    pub photons_outside: u64,
    /// Events after the last frame marker, not processed.
    pub trailing_events: usize,
}

/// State carried from event to event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerState {
    /// Frame state.
    pub frame: FrameState,
    /// Line state.
    pub line: LineState,
    /// Row photons are currently attributed to.
    pub current_line: usize,
    /// Sync of the most recent line start.
    pub line_sync_start: u64,
    /// Frame markers seen so far.
    pub frame_count: usize,
    single_frame: bool,
}

impl AssemblerState {
    /// Initial state. In single-frame mode the assembler never leaves the
    /// frame.
    #[must_use]
    pub fn new(single_frame: bool) -> Self {
        Self {
            frame: if single_frame {
                FrameState::Inside
            } else {
                FrameState::Outside
            },
            line: LineState::Idle,
            current_line: 0,
            line_sync_start: 0,
            frame_count: 0,
            single_frame,
        }
    }

    /// Applies one marker event. A value matching several markers triggers
    /// the frame transition and at most one of line start / line stop.
    pub fn on_marker(&mut self, special: u8, sync: u64, markers: &Markers, rows: usize) {
        if special == markers.frame {
            self.frame = FrameState::Inside;
            self.frame_count += 1;
            self.current_line = 0;
        }
        if special == markers.line_start {
            self.line = LineState::Scanning;
            self.line_sync_start = sync;
        } else if special == markers.line_stop {
            self.line = LineState::Idle;
            self.current_line += 1;
            if self.current_line >= rows {
                if !self.single_frame {
                    self.frame = FrameState::Outside;
                }
                self.current_line = 0;
            }
        }
    }

    /// Whether a photon arriving now belongs to the image.
    #[inline]
    #[must_use]
    pub fn accepts_photons(&self) -> bool {
        self.frame == FrameState::Inside && self.line == LineState::Scanning
    }
}

/// Builds FLIM histograms from overflow-corrected event streams.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    params: ImagingParams,
    config: AssemblerConfig,
}

impl FrameAssembler {
    /// Creates an assembler with default configuration.
    #[must_use]
    pub fn new(params: ImagingParams) -> Self {
        Self::with_config(params, AssemblerConfig::default())
    }

    /// Creates an assembler with the given configuration.
    #[must_use]
    pub fn with_config(params: ImagingParams, config: AssemblerConfig) -> Self {
        Self { params, config }
    }

    /// Imaging parameters in use.
    #[must_use]
    pub fn params(&self) -> &ImagingParams {
        &self.params
    }

    /// Mean line duration in sync pulses, floored.
    ///
    /// Line starts and stops are paired in order. The first
    /// `transient_lines` pairs are skipped unless that would leave none.
    ///
    /// # Errors
    /// [`Error::NotFlimData`] without any line marker pair or when the mean
    /// span is below one sync pulse.
    pub fn sync_pulses_per_line(&self, events: &EventBatch) -> Result<f64> {
        let markers = self.params.markers;
        let mut starts = Vec::new();
        let mut stops = Vec::new();
        for (&special, &sync) in events.special.iter().zip(&events.sync) {
            if special == 0 {
                continue;
            }
            if special == markers.line_start {
                starts.push(sync);
            } else if special == markers.line_stop {
                stops.push(sync);
            }
        }

        if starts.len() != stops.len() {
            log::warn!(
                "unpaired line markers: {} starts, {} stops",
                starts.len(),
                stops.len()
            );
        }
        let pairs = starts.len().min(stops.len());
        if pairs == 0 {
            return Err(Error::NotFlimData("no line start/stop marker pairs".into()));
        }
        let skip = if pairs > self.config.transient_lines {
            self.config.transient_lines
        } else {
            0
        };

        #[allow(clippy::cast_precision_loss)]
        let mean = starts[skip..pairs]
            .iter()
            .zip(&stops[skip..pairs])
            .map(|(&start, &stop)| stop as f64 - start as f64)
            .sum::<f64>()
            / (pairs - skip) as f64;

        let span = mean.floor();
        if span.is_nan() || span < 1.0 {
            return Err(Error::NotFlimData(format!(
                "line duration of {mean} sync pulses"
            )));
        }
        Ok(span)
    }

    /// Runs the state machine over `events` and returns the histogram.
    ///
    /// # Errors
    /// [`Error::NotFlimData`] when the acquisition is not a marker-driven
    /// image scan, has no usable line markers, or lacks a frame marker while
    /// one is required.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn assemble(&self, events: &EventBatch) -> Result<(FlimHistogram, AssemblyStats)> {
        self.params.ensure_flim_image()?;
        if events.is_empty() {
            return Err(Error::EmptyInput("event stream"));
        }

        let markers = self.params.markers;
        let rows = self.params.pixels_y;
        let cols = self.params.pixels_x;
        let channels = events.distinct_channels();
        let bins = events.distinct_microtimes();

        let frame_syncs: Vec<u64> = events
            .special
            .iter()
            .zip(&events.sync)
            .filter(|&(&s, _)| s == markers.frame)
            .map(|(_, &sync)| sync)
            .collect();
        if frame_syncs.is_empty() && self.config.require_frame_marker {
            return Err(Error::NotFlimData("no frame marker in event stream".into()));
        }
        let single_frame = frame_syncs.len() <= 1;

        // Inclusive end of the processed range.
        let end = match frame_syncs.last() {
            Some(&last) => events
                .sync
                .iter()
                .position(|&s| s == last)
                .unwrap_or(events.len() - 1),
            None => events.len() - 1,
        };

        let spl = self.sync_pulses_per_line(events)?;

        let mut histogram = FlimHistogram::new(rows, cols, channels, bins);
        let mut state = AssemblerState::new(single_frame);
        let mut stats = AssemblyStats {
            trailing_events: events.len() - end - 1,
            ..AssemblyStats::default()
        };

        for i in 0..=end {
            let special = events.special[i];
            let sync = events.sync[i];

            if special != 0 {
                if special == markers.line_stop && special != markers.line_start {
                    stats.lines += 1;
                }
                state.on_marker(special, sync, &markers, rows);
                continue;
            }

            if !state.accepts_photons() {
                stats.photons_outside += 1;
                continue;
            }

            // Fraction of the line first, then pixels; a photon exactly one
            // line duration after the start falls past the last column.
            let offset = sync as f64 - state.line_sync_start as f64;
            let column = ((offset / spl) * cols as f64).floor();
            let channel = usize::from(events.channel[i]);
            let bin = usize::from(events.microtime[i]);
            if column >= 0.0
                && (column as usize) < cols
                && histogram.increment(state.current_line, column as usize, channel, bin)
            {
                stats.photons_binned += 1;
            } else {
                stats.photons_dropped += 1;
            }
        }
        stats.frames = state.frame_count;

        log::debug!(
            "assembled {} frames, {} lines: {} photons binned, {} dropped, {} outside, {} trailing events",
            stats.frames,
            stats.lines,
            stats.photons_binned,
            stats.photons_dropped,
            stats.photons_outside,
            stats.trailing_events
        );
        Ok((histogram, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptuflim_core::{DecodedEvent, ScannerKind};

    fn params(pixels: usize) -> ImagingParams {
        ImagingParams {
            pixels_x: pixels,
            pixels_y: pixels,
            markers: Markers::default(),
            scanner: ScannerKind::MarkerDriven,
            measurement_submode: 3,
            microtime_resolution_s: 16e-12,
            sync_period_s: 25e-9,
        }
    }

    const START: u8 = 1;
    const STOP: u8 = 2;
    const FRAME: u8 = 4;

    /// Three 30-sync lines, photons at the given (line, offset) positions,
    /// frame marker at the end.
    fn three_by_three(photons: &[(u64, u64)], extra: &[DecodedEvent]) -> EventBatch {
        let mut events = Vec::new();
        for line in 0..3u64 {
            let start = 100 + line * 50;
            events.push(DecodedEvent::marker(start, START));
            for &(l, offset) in photons {
                if l == line {
                    events.push(DecodedEvent::photon(start + offset, 1, 0));
                }
            }
            events.push(DecodedEvent::marker(start + 30, STOP));
            // Retrace photon.
            events.push(DecodedEvent::photon(start + 40, 1, 0));
        }
        events.push(DecodedEvent::marker(300, FRAME));
        events.extend_from_slice(extra);
        events.into_iter().collect()
    }

    #[test]
    fn test_three_by_three_single_frame() {
        let photons = [(0, 0), (0, 10), (0, 29), (1, 15), (2, 20), (2, 25)];
        let events = three_by_three(&photons, &[DecodedEvent::photon(400, 1, 0)]);
        let (hist, stats) = FrameAssembler::new(params(3)).assemble(&events).unwrap();

        assert_eq!(hist.rows(), 3);
        assert_eq!(hist.cols(), 3);
        // Channels 0, 1, 2 and 4 occur (markers carry their bits).
        assert_eq!(hist.channels(), 4);
        // Markers record microtime 0, photons 1.
        assert_eq!(hist.bins(), 2);

        assert_eq!(hist.total(), 6);
        assert_eq!(stats.photons_binned, 6);
        assert_eq!(stats.photons_outside, 3);
        assert_eq!(stats.trailing_events, 1);
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.lines, 3);

        let image = hist.intensity_image();
        assert_eq!(image[[0, 0]], 1);
        assert_eq!(image[[0, 1]], 1);
        assert_eq!(image[[0, 2]], 1);
        assert_eq!(image[[1, 1]], 1);
        assert_eq!(image[[2, 2]], 2);
    }

    /// One line of `span` sync pulses across three columns with a single
    /// photon `offset` pulses after the line start.
    fn single_line(span: u64, offset: u64) -> (FlimHistogram, AssemblyStats) {
        let events: EventBatch = [
            DecodedEvent::marker(0, START),
            DecodedEvent::photon(offset, 0, 0),
            DecodedEvent::marker(span, STOP),
            DecodedEvent::marker(span + 10, FRAME),
        ]
        .into_iter()
        .collect();
        let mut p = params(3);
        p.pixels_y = 1;
        FrameAssembler::new(p).assemble(&events).unwrap()
    }

    #[test]
    fn test_column_on_pixel_boundary() {
        // 49 / 147 * 3 is exactly one column.
        let (hist, stats) = single_line(147, 49);
        assert_eq!(hist.get(0, 1, 0, 0), Some(1));
        assert_eq!(hist.get(0, 0, 0, 0), Some(0));
        assert_eq!(stats.photons_binned, 1);
    }

    #[test]
    fn test_photon_at_line_end_is_dropped() {
        let (hist, stats) = single_line(47, 47);
        assert_eq!(hist.total(), 0);
        assert_eq!(stats.photons_binned, 0);
        assert_eq!(stats.photons_dropped, 1);
    }

    #[test]
    fn test_sync_pulses_per_line_skips_transients() {
        let mut events = EventBatch::default();
        let mut t = 0;
        for k in 0..15u64 {
            let span = if k < 10 { 1000 } else { 100 };
            events.push(DecodedEvent::marker(t, START));
            events.push(DecodedEvent::marker(t + span, STOP));
            t += span + 10;
        }
        let assembler = FrameAssembler::new(params(4));
        assert!((assembler.sync_pulses_per_line(&events).unwrap() - 100.0).abs() < f64::EPSILON);

        let all = FrameAssembler::with_config(
            params(4),
            AssemblerConfig::new().with_transient_lines(0),
        );
        let expected = ((10.0 * 1000.0 + 5.0 * 100.0) / 15.0_f64).floor();
        assert!((all.sync_pulses_per_line(&events).unwrap() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_line_markers() {
        let events: EventBatch = [DecodedEvent::photon(1, 0, 0), DecodedEvent::marker(2, FRAME)]
            .into_iter()
            .collect();
        assert!(matches!(
            FrameAssembler::new(params(2)).assemble(&events),
            Err(Error::NotFlimData(_))
        ));
    }

    #[test]
    fn test_point_measurement_rejected() {
        let mut p = params(3);
        p.measurement_submode = 0;
        let events = three_by_three(&[(0, 1)], &[]);
        assert!(matches!(
            FrameAssembler::new(p).assemble(&events),
            Err(Error::NotFlimData(_))
        ));
    }

    #[test]
    fn test_missing_frame_marker() {
        let events: EventBatch = [
            DecodedEvent::marker(0, START),
            DecodedEvent::photon(5, 0, 0),
            DecodedEvent::marker(10, STOP),
        ]
        .into_iter()
        .collect();

        let (hist, stats) = FrameAssembler::new(params(1)).assemble(&events).unwrap();
        assert_eq!(hist.total(), 1);
        assert_eq!(stats.frames, 0);

        let strict = FrameAssembler::with_config(
            params(1),
            AssemblerConfig::new().with_require_frame_marker(true),
        );
        assert!(strict.assemble(&events).is_err());
    }

    #[test]
    fn test_multi_frame_closes_after_last_line() {
        // Two frames of one 2-pixel line each; photons between the frame's
        // last line stop and the next frame marker are outside.
        let events: EventBatch = [
            DecodedEvent::marker(0, FRAME),
            DecodedEvent::marker(10, START),
            DecodedEvent::photon(12, 0, 0),
            DecodedEvent::marker(30, STOP),
            DecodedEvent::marker(35, START),
            DecodedEvent::photon(36, 0, 0),
            DecodedEvent::marker(55, STOP),
            DecodedEvent::marker(60, FRAME),
            DecodedEvent::marker(70, START),
            DecodedEvent::photon(85, 0, 0),
            DecodedEvent::marker(90, STOP),
        ]
        .into_iter()
        .collect();

        let mut p = params(2);
        p.pixels_y = 1;
        let (hist, stats) = FrameAssembler::new(p).assemble(&events).unwrap();

        // Processing ends at the last frame marker (sync 60).
        assert_eq!(stats.trailing_events, 3);
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.photons_binned, 1);
        assert_eq!(stats.photons_outside, 1);
        assert_eq!(hist.total(), 1);
        assert_eq!(hist.intensity_image()[[0, 0]], 1);
    }

    #[test]
    fn test_state_transitions() {
        let markers = Markers::default();
        let mut state = AssemblerState::new(false);
        assert!(!state.accepts_photons());

        state.on_marker(START, 5, &markers, 2);
        assert_eq!(state.line, LineState::Scanning);
        assert!(!state.accepts_photons());

        state.on_marker(FRAME, 6, &markers, 2);
        assert!(state.accepts_photons());
        assert_eq!(state.frame_count, 1);

        state.on_marker(STOP, 7, &markers, 2);
        assert_eq!(state.current_line, 1);
        state.on_marker(START, 8, &markers, 2);
        state.on_marker(STOP, 9, &markers, 2);
        assert_eq!(state.current_line, 0);
        assert_eq!(state.frame, FrameState::Outside);

        let mut single = AssemblerState::new(true);
        single.on_marker(STOP, 1, &markers, 1);
        assert_eq!(single.frame, FrameState::Inside);
    }
}
