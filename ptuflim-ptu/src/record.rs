//! TTTR record types and per-word bit layouts.

use serde::{Deserialize, Serialize};

/// TTTR record type codes (`TTResultFormat_TTTRRecType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum RecordType {
    /// PicoHarp 300, T3 mode.
    PicoHarpT3 = 0x0001_0303,
    /// PicoHarp 300, T2 mode.
    PicoHarpT2 = 0x0001_0203,
    /// HydraHarp 400 (V1 firmware), T3 mode.
    HydraHarpT3 = 0x0001_0304,
    /// HydraHarp 400 (V1 firmware), T2 mode.
    HydraHarpT2 = 0x0001_0204,
    /// HydraHarp 400 (V2 firmware), T3 mode.
    HydraHarp2T3 = 0x0101_0304,
    /// HydraHarp 400 (V2 firmware), T2 mode.
    HydraHarp2T2 = 0x0101_0204,
    /// TimeHarp 260 N, T3 mode.
    TimeHarp260NT3 = 0x0001_0305,
    /// TimeHarp 260 N, T2 mode.
    TimeHarp260NT2 = 0x0001_0205,
    /// TimeHarp 260 P, T3 mode.
    TimeHarp260PT3 = 0x0001_0306,
    /// TimeHarp 260 P, T2 mode.
    TimeHarp260PT2 = 0x0001_0206,
    /// MultiHarp, T3 mode.
    MultiHarpT3 = 0x0001_0307,
    /// MultiHarp, T2 mode.
    MultiHarpT2 = 0x0001_0207,
}

impl RecordType {
    /// All supported record types.
    pub const ALL: [RecordType; 12] = [
        RecordType::PicoHarpT3,
        RecordType::PicoHarpT2,
        RecordType::HydraHarpT3,
        RecordType::HydraHarpT2,
        RecordType::HydraHarp2T3,
        RecordType::HydraHarp2T2,
        RecordType::TimeHarp260NT3,
        RecordType::TimeHarp260NT2,
        RecordType::TimeHarp260PT3,
        RecordType::TimeHarp260PT2,
        RecordType::MultiHarpT3,
        RecordType::MultiHarpT2,
    ];

    /// Looks up a record type from its header code.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0x0001_0303 => Some(RecordType::PicoHarpT3),
            0x0001_0203 => Some(RecordType::PicoHarpT2),
            0x0001_0304 => Some(RecordType::HydraHarpT3),
            0x0001_0204 => Some(RecordType::HydraHarpT2),
            0x0101_0304 => Some(RecordType::HydraHarp2T3),
            0x0101_0204 => Some(RecordType::HydraHarp2T2),
            0x0001_0305 => Some(RecordType::TimeHarp260NT3),
            0x0001_0205 => Some(RecordType::TimeHarp260NT2),
            0x0001_0306 => Some(RecordType::TimeHarp260PT3),
            0x0001_0206 => Some(RecordType::TimeHarp260PT2),
            0x0001_0307 => Some(RecordType::MultiHarpT3),
            0x0001_0207 => Some(RecordType::MultiHarpT2),
            _ => None,
        }
    }

    /// Header code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Bit layout of the records.
    #[must_use]
    pub const fn layout(self) -> RecordLayout {
        match self {
            RecordType::PicoHarpT3 => RecordLayout::PicoHarpT3,
            RecordType::PicoHarpT2 => RecordLayout::PicoHarpT2,
            RecordType::HydraHarpT3
            | RecordType::HydraHarp2T3
            | RecordType::TimeHarp260NT3
            | RecordType::TimeHarp260PT3
            | RecordType::MultiHarpT3 => RecordLayout::HydraHarpT3,
            RecordType::HydraHarpT2 => RecordLayout::HydraHarpT2V1,
            RecordType::HydraHarp2T2
            | RecordType::TimeHarp260NT2
            | RecordType::TimeHarp260PT2
            | RecordType::MultiHarpT2 => RecordLayout::HydraHarpT2V2,
        }
    }

    /// How overflow records advance the sync counter.
    #[must_use]
    pub const fn overflow_mode(self) -> OverflowMode {
        match self {
            RecordType::PicoHarpT3
            | RecordType::PicoHarpT2
            | RecordType::HydraHarpT3
            | RecordType::HydraHarpT2 => OverflowMode::Single,
            _ => OverflowMode::RepeatCount,
        }
    }

    /// Returns true for T3 (sync + microtime) records.
    #[must_use]
    pub const fn is_t3(self) -> bool {
        matches!(
            self.layout(),
            RecordLayout::PicoHarpT3 | RecordLayout::HydraHarpT3
        )
    }

    /// Display name, e.g. `"PicoHarpT3"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            RecordType::PicoHarpT3 => "PicoHarpT3",
            RecordType::PicoHarpT2 => "PicoHarpT2",
            RecordType::HydraHarpT3 => "HydraHarpT3",
            RecordType::HydraHarpT2 => "HydraHarpT2",
            RecordType::HydraHarp2T3 => "HydraHarp2T3",
            RecordType::HydraHarp2T2 => "HydraHarp2T2",
            RecordType::TimeHarp260NT3 => "TimeHarp260NT3",
            RecordType::TimeHarp260NT2 => "TimeHarp260NT2",
            RecordType::TimeHarp260PT3 => "TimeHarp260PT3",
            RecordType::TimeHarp260PT2 => "TimeHarp260PT2",
            RecordType::MultiHarpT3 => "MultiHarpT3",
            RecordType::MultiHarpT2 => "MultiHarpT2",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Overflow accounting used by a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowMode {
    /// Each overflow record stands for one wraparound.
    Single,
    /// The overflow record's sync field holds the number of wraparounds.
    RepeatCount,
}

/// One 32-bit record split into its fields, before overflow correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawRecord {
    /// Sync field (or repeat count for overflow records).
    pub sync: u32,
    /// Microtime field.
    pub microtime: u16,
    /// Channel after any layout-specific remapping.
    pub channel: u8,
    /// Marker bits; zero for photons and overflows.
    pub special: u8,
    /// Whether this record is a sync overflow.
    pub overflow: bool,
}

/// Bit layout families shared by the record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordLayout {
    /// 16-bit sync, 12-bit microtime, 4-bit channel.
    PicoHarpT3,
    /// 28-bit time tag, 4-bit channel.
    PicoHarpT2,
    /// 10-bit sync, 15-bit microtime, 6-bit channel, special bit.
    HydraHarpT3,
    /// 25-bit time tag, 6-bit channel, special bit (V1 wraparound).
    HydraHarpT2V1,
    /// 25-bit time tag, 6-bit channel, special bit.
    HydraHarpT2V2,
}

const HH_SPECIAL_BIT: u32 = 1 << 31;
const HH_OVERFLOW_CHANNEL: u8 = 63;
const PH_SPECIAL_CHANNEL: u8 = 15;

impl RecordLayout {
    /// Sync counter wraparound added per overflow.
    #[must_use]
    pub const fn wraparound(self) -> u64 {
        match self {
            RecordLayout::PicoHarpT3 => 65_536,
            RecordLayout::PicoHarpT2 => 210_698_240,
            RecordLayout::HydraHarpT3 => 1_024,
            RecordLayout::HydraHarpT2V1 => 33_552_000,
            RecordLayout::HydraHarpT2V2 => 33_554_432,
        }
    }

    /// Splits one record word into its fields.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(self, w: u32) -> RawRecord {
        match self {
            RecordLayout::PicoHarpT3 => {
                let microtime = ((w >> 16) & 0xFFF) as u16;
                let c = ((w >> 28) & 0xF) as u8;
                let (special, overflow) = if c == PH_SPECIAL_CHANNEL {
                    let bits = (microtime & 0xF) as u8;
                    (bits, bits == 0)
                } else {
                    (0, false)
                };
                let channel = match if c == PH_SPECIAL_CHANNEL { special } else { c } {
                    1 | 4 => 0,
                    2 => 1,
                    other => other,
                };
                RawRecord {
                    sync: w & 0xFFFF,
                    microtime,
                    channel,
                    special,
                    overflow,
                }
            }
            RecordLayout::PicoHarpT2 => {
                let c = ((w >> 28) & 0xF) as u8;
                let low = (w & 0xF) as u8;
                let special = if c == PH_SPECIAL_CHANNEL { low } else { 0 };
                RawRecord {
                    sync: w & 0x0FFF_FFFF,
                    microtime: u16::from(low),
                    channel: c,
                    special,
                    overflow: c == PH_SPECIAL_CHANNEL && low == 0,
                }
            }
            RecordLayout::HydraHarpT3 => {
                let c = ((w >> 25) & 0x3F) as u8;
                let is_special = w & HH_SPECIAL_BIT != 0;
                RawRecord {
                    sync: w & 0x3FF,
                    microtime: ((w >> 10) & 0x7FFF) as u16,
                    channel: c,
                    special: if is_special { c } else { 0 },
                    overflow: is_special && c == HH_OVERFLOW_CHANNEL,
                }
            }
            RecordLayout::HydraHarpT2V1 | RecordLayout::HydraHarpT2V2 => {
                let c = ((w >> 25) & 0x3F) as u8;
                let is_special = w & HH_SPECIAL_BIT != 0;
                RawRecord {
                    sync: w & 0x01FF_FFFF,
                    microtime: u16::from(c & 0xF),
                    channel: c,
                    special: if is_special { c } else { 0 },
                    overflow: is_special && c == HH_OVERFLOW_CHANNEL,
                }
            }
        }
    }

    /// Encodes a photon record. Fields are masked to their widths.
    ///
    /// `channel` is the raw hardware channel field, before any remapping
    /// [`RecordLayout::decode`] applies.
    #[must_use]
    pub fn encode_photon(self, sync: u32, microtime: u16, channel: u8) -> u32 {
        let (microtime, channel) = (u32::from(microtime), u32::from(channel));
        match self {
            RecordLayout::PicoHarpT3 => {
                ((channel & 0xF) << 28) | ((microtime & 0xFFF) << 16) | (sync & 0xFFFF)
            }
            RecordLayout::PicoHarpT2 => ((channel & 0xF) << 28) | (sync & 0x0FFF_FFFF),
            RecordLayout::HydraHarpT3 => {
                ((channel & 0x3F) << 25) | ((microtime & 0x7FFF) << 10) | (sync & 0x3FF)
            }
            RecordLayout::HydraHarpT2V1 | RecordLayout::HydraHarpT2V2 => {
                ((channel & 0x3F) << 25) | (sync & 0x01FF_FFFF)
            }
        }
    }

    /// Encodes a marker record carrying `bits` (non-zero, at most 4 bits for
    /// the PicoHarp layouts and 6 bits otherwise).
    #[must_use]
    pub fn encode_marker(self, sync: u32, bits: u8) -> u32 {
        let bits = u32::from(bits);
        match self {
            RecordLayout::PicoHarpT3 => (0xF << 28) | ((bits & 0xF) << 16) | (sync & 0xFFFF),
            RecordLayout::PicoHarpT2 => (0xF << 28) | (sync & 0x0FFF_FFF0) | (bits & 0xF),
            RecordLayout::HydraHarpT3 => HH_SPECIAL_BIT | ((bits & 0x3F) << 25) | (sync & 0x3FF),
            RecordLayout::HydraHarpT2V1 | RecordLayout::HydraHarpT2V2 => {
                HH_SPECIAL_BIT | ((bits & 0x3F) << 25) | (sync & 0x01FF_FFFF)
            }
        }
    }

    /// Encodes an overflow record. `count` is the repeat count and is
    /// ignored by layouts whose overflow field cannot hold it.
    #[must_use]
    pub fn encode_overflow(self, count: u32) -> u32 {
        match self {
            RecordLayout::PicoHarpT3 => (0xF << 28) | (count & 0xFFFF),
            RecordLayout::PicoHarpT2 => (0xF << 28) | ((count << 4) & 0x0FFF_FFF0),
            RecordLayout::HydraHarpT3 => {
                HH_SPECIAL_BIT | (u32::from(HH_OVERFLOW_CHANNEL) << 25) | (count & 0x3FF)
            }
            RecordLayout::HydraHarpT2V1 | RecordLayout::HydraHarpT2V2 => {
                HH_SPECIAL_BIT | (u32::from(HH_OVERFLOW_CHANNEL) << 25) | (count & 0x01FF_FFFF)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_codes() {
        for rt in RecordType::ALL {
            assert_eq!(RecordType::from_code(rt.code()), Some(rt));
        }
        assert_eq!(RecordType::from_code(0x0001_0399), None);
        assert_eq!(RecordType::MultiHarpT3.to_string(), "MultiHarpT3");
    }

    #[test]
    fn test_overflow_modes() {
        assert_eq!(RecordType::PicoHarpT3.overflow_mode(), OverflowMode::Single);
        assert_eq!(RecordType::HydraHarpT2.overflow_mode(), OverflowMode::Single);
        assert_eq!(
            RecordType::HydraHarp2T3.overflow_mode(),
            OverflowMode::RepeatCount
        );
        assert_eq!(
            RecordType::TimeHarp260NT2.overflow_mode(),
            OverflowMode::RepeatCount
        );
    }

    #[test]
    fn test_picoharp_t3_photon() {
        let rec = RecordLayout::PicoHarpT3.decode(0x0001_0203);
        assert_eq!(rec.sync, 515);
        assert_eq!(rec.microtime, 1);
        assert_eq!(rec.channel, 0);
        assert_eq!(rec.special, 0);
        assert!(!rec.overflow);
    }

    #[test]
    fn test_picoharp_t3_channel_remap() {
        let layout = RecordLayout::PicoHarpT3;
        assert_eq!(layout.decode(layout.encode_photon(0, 0, 1)).channel, 0);
        assert_eq!(layout.decode(layout.encode_photon(0, 0, 2)).channel, 1);
        assert_eq!(layout.decode(layout.encode_photon(0, 0, 3)).channel, 3);
        assert_eq!(layout.decode(layout.encode_photon(0, 0, 4)).channel, 0);

        // Marker 2 lands on channel 1 after the remap.
        let marker = layout.decode(layout.encode_marker(42, 2));
        assert_eq!(marker.special, 2);
        assert_eq!(marker.channel, 1);
        assert_eq!(marker.sync, 42);
        assert!(!marker.overflow);

        // Marker 8 keeps its channel.
        assert_eq!(layout.decode(layout.encode_marker(0, 8)).channel, 8);
    }

    #[test]
    fn test_picoharp_t3_overflow() {
        let rec = RecordLayout::PicoHarpT3.decode(0xF000_0000);
        assert!(rec.overflow);
        assert_eq!(rec.special, 0);
    }

    #[test]
    fn test_picoharp_t2() {
        let layout = RecordLayout::PicoHarpT2;
        let rec = layout.decode(0x3000_1235);
        assert_eq!(rec.sync, 0x0000_1235);
        assert_eq!(rec.microtime, 5);
        assert_eq!(rec.channel, 3);
        assert_eq!(rec.special, 0);

        let marker = layout.decode(0xF000_0014);
        assert_eq!(marker.special, 4);
        assert!(!marker.overflow);

        let overflow = layout.decode(0xF000_0010);
        assert!(overflow.overflow);
    }

    #[test]
    fn test_hydraharp_t3() {
        let layout = RecordLayout::HydraHarpT3;
        let word = layout.encode_photon(1000, 12_345, 5);
        let rec = layout.decode(word);
        assert_eq!(rec.sync, 1000);
        assert_eq!(rec.microtime, 12_345);
        assert_eq!(rec.channel, 5);
        assert_eq!(rec.special, 0);

        let marker = layout.decode(layout.encode_marker(7, 4));
        assert_eq!(marker.special, 4);
        assert_eq!(marker.channel, 4);
        assert!(!marker.overflow);

        let overflow = layout.decode(layout.encode_overflow(3));
        assert!(overflow.overflow);
        assert_eq!(overflow.sync, 3);
    }

    #[test]
    fn test_hydraharp_t2() {
        for layout in [RecordLayout::HydraHarpT2V1, RecordLayout::HydraHarpT2V2] {
            let rec = layout.decode(layout.encode_photon(0x01AB_CDEF, 0, 0x13));
            assert_eq!(rec.sync, 0x01AB_CDEF);
            assert_eq!(rec.channel, 0x13);
            assert_eq!(rec.microtime, 0x3);
            assert!(!layout.decode(layout.encode_marker(1, 1)).overflow);
            assert!(layout.decode(layout.encode_overflow(1)).overflow);
        }
        assert_eq!(RecordLayout::HydraHarpT2V1.wraparound(), 33_552_000);
        assert_eq!(RecordLayout::HydraHarpT2V2.wraparound(), 33_554_432);
    }
}
