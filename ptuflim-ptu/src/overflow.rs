//! Sync counter overflow correction.
//!
//! The hardware sync counter is only a few bits wide and wraps around. Each
//! wrap is recorded as an overflow record; adding the accumulated wraps to
//! every following record yields a monotonic 64-bit sync counter.

use crate::decoder::DecodeResult;
use crate::record::OverflowMode;
use crate::{Error, Result};
use ptuflim_core::EventBatch;

/// Counters reported by [`correct_overflows`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverflowStats {
    /// Number of overflow records removed.
    pub overflow_events: usize,
    /// Total number of wraparounds applied (differs from `overflow_events`
    /// in repeat-count mode).
    pub total_wraps: u64,
}

/// Number of wraps an overflow record stands for.
#[inline]
#[must_use]
pub fn wraps_for(mode: OverflowMode, raw_sync: u64) -> u64 {
    match mode {
        OverflowMode::Single => 1,
        // Older firmware writes 0 for a single overflow.
        OverflowMode::RepeatCount => raw_sync.max(1),
    }
}

/// Applies overflow correction and removes the overflow records.
///
/// Photon and marker rows keep their order; their sync becomes
/// `raw_sync + wraparound * wraps_so_far`.
///
/// # Errors
/// [`Error::SyncOverflow`] if the accumulated wraps or a corrected sync
/// exceed `u64`.
pub fn correct_overflows(decoded: &DecodeResult) -> Result<(EventBatch, OverflowStats)> {
    let layout = decoded.record_type.layout();
    let mode = decoded.record_type.overflow_mode();
    let wrap = layout.wraparound();
    let events = &decoded.events;

    let overflow_events = decoded.overflow_count();
    let mut out = EventBatch::with_capacity(events.len() - overflow_events);
    let mut wraps: u64 = 0;

    for (i, &is_overflow) in decoded.overflow.iter().enumerate() {
        let sync = events.sync[i];
        if is_overflow {
            wraps = wraps
                .checked_add(wraps_for(mode, sync))
                .ok_or(Error::SyncOverflow { record: i })?;
            continue;
        }
        let corrected = wrap
            .checked_mul(wraps)
            .and_then(|base| base.checked_add(sync))
            .ok_or(Error::SyncOverflow { record: i })?;
        out.sync.push(corrected);
        out.microtime.push(events.microtime[i]);
        out.channel.push(events.channel[i]);
        out.special.push(events.special[i]);
    }

    let stats = OverflowStats {
        overflow_events,
        total_wraps: wraps,
    };
    log::debug!(
        "overflow correction: removed {} overflow records, {} wraps of {wrap}",
        stats.overflow_events,
        stats.total_wraps
    );
    Ok((out, stats))
}
