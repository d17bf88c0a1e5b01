//! Structure of Arrays (`SoA`) types for decoded TTTR events.
//!
//! This module defines the `EventBatch` structure which stores decoded
//! records in parallel vectors (`SoA` layout) rather than an array of
//! structs (`AoS`). The frame assembler walks these columns in lock step.

use crate::event::DecodedEvent;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A batch of decoded events stored in Structure of Arrays (`SoA`) format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventBatch {
    /// Sync counter (laser pulses since acquisition start).
    pub sync: Vec<u64>,
    /// Microtime (TCSPC) bin.
    pub microtime: Vec<u16>,
    /// Detector channel, or marker bits for special records.
    pub channel: Vec<u8>,
    /// Marker bits; zero for photons.
    pub special: Vec<u8>,
}

impl EventBatch {
    /// Creates a new empty batch with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sync: Vec::with_capacity(capacity),
            microtime: Vec::with_capacity(capacity),
            channel: Vec::with_capacity(capacity),
            special: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of events in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sync.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sync.is_empty()
    }

    /// Pushes a single event into the batch.
    pub fn push(&mut self, event: DecodedEvent) {
        self.sync.push(event.sync);
        self.microtime.push(event.microtime);
        self.channel.push(event.channel);
        self.special.push(event.special);
    }

    /// Returns the event at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<DecodedEvent> {
        Some(DecodedEvent {
            sync: *self.sync.get(index)?,
            microtime: *self.microtime.get(index)?,
            channel: *self.channel.get(index)?,
            special: *self.special.get(index)?,
        })
    }

    /// Iterates over the events as row structs.
    pub fn iter(&self) -> impl Iterator<Item = DecodedEvent> + '_ {
        self.sync
            .iter()
            .zip(&self.microtime)
            .zip(&self.channel)
            .zip(&self.special)
            .map(|(((&sync, &microtime), &channel), &special)| DecodedEvent {
                sync,
                microtime,
                channel,
                special,
            })
    }

    /// Number of photon events (`special == 0`).
    #[must_use]
    pub fn photon_count(&self) -> usize {
        self.special.iter().filter(|&&s| s == 0).count()
    }

    /// Number of distinct values in the channel column.
    #[must_use]
    pub fn distinct_channels(&self) -> usize {
        let mut seen = [false; 256];
        for &c in &self.channel {
            seen[usize::from(c)] = true;
        }
        seen.iter().filter(|&&s| s).count()
    }

    /// Number of distinct values in the microtime column.
    #[must_use]
    pub fn distinct_microtimes(&self) -> usize {
        let mut seen = vec![false; usize::from(u16::MAX) + 1];
        let mut count = 0;
        for &m in &self.microtime {
            let slot = &mut seen[usize::from(m)];
            if !*slot {
                *slot = true;
                count += 1;
            }
        }
        count
    }
}

impl FromIterator<DecodedEvent> for EventBatch {
    fn from_iter<I: IntoIterator<Item = DecodedEvent>>(iter: I) -> Self {
        let mut batch = EventBatch::default();
        for event in iter {
            batch.push(event);
        }
        batch
    }
}
