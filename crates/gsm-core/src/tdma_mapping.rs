//! Logical-channel to TDMA-slot mappings from GSM 05.02 Clause 7.
//!
//! A `TdmaMapping` describes, for one logical channel, on which frames within
//! a repeating period its bursts are transmitted. `frame_mapping(i)` gives the
//! frame offset of burst `i` of a block; `reverse_mapping(fn)` recovers the
//! burst index from a received frame number.

use core::fmt;

/// Channel type with sub-slot offset, carried in SAP indications and taps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAndOffset {
    Fcch,
    Sch,
    Bcch,
    Ccch(u8),
    Rach,
    Sdcch8(u8),
    Sacch8(u8),
    TchF,
    SacchTf,
}

impl fmt::Display for TypeAndOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeAndOffset::Fcch => write!(f, "FCCH"),
            TypeAndOffset::Sch => write!(f, "SCH"),
            TypeAndOffset::Bcch => write!(f, "BCCH"),
            TypeAndOffset::Ccch(b) => write!(f, "CCCH-{}", b),
            TypeAndOffset::Rach => write!(f, "RACH"),
            TypeAndOffset::Sdcch8(s) => write!(f, "SDCCH/8-{}", s),
            TypeAndOffset::Sacch8(s) => write!(f, "SACCH/C8-{}", s),
            TypeAndOffset::TchF => write!(f, "TCH/F"),
            TypeAndOffset::SacchTf => write!(f, "SACCH/TF"),
        }
    }
}

#[derive(Clone, Copy)]
pub struct TdmaMapping {
    /// Bitmask of timeslots this channel may occupy (bit n = TN n)
    allowed_slots: u8,
    /// True for a BTS-transmit (downlink) channel
    downlink: bool,
    /// Frame offsets, within the repeat period, of the bursts of one block
    frames: &'static [u32],
    /// Repeat period in frames (51, 26, 102, 104, ...)
    repeat_length: u32,
    type_and_offset: TypeAndOffset,
}

impl TdmaMapping {
    pub const fn new(
        allowed_slots: u8,
        downlink: bool,
        frames: &'static [u32],
        repeat_length: u32,
        type_and_offset: TypeAndOffset,
    ) -> TdmaMapping {
        TdmaMapping { allowed_slots, downlink, frames, repeat_length, type_and_offset }
    }

    /// Frame offset for burst `i`, wrapping over the block length.
    pub fn frame_mapping(&self, i: usize) -> u32 {
        self.frames[i % self.frames.len()]
    }

    /// Burst index for a received frame number, or None if this frame does
    /// not belong to the channel. None where an index is required means the
    /// demux is misconfigured, which is a fatal programming error.
    pub fn reverse_mapping(&self, frame: u32) -> Option<usize> {
        let offset = frame % self.repeat_length;
        self.frames.iter().position(|&f| f == offset)
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn repeat_length(&self) -> u32 {
        self.repeat_length
    }

    pub fn allowed_slot(&self, tn: u8) -> bool {
        tn < 8 && (self.allowed_slots >> tn) & 1 == 1
    }

    pub fn downlink(&self) -> bool {
        self.downlink
    }

    pub fn type_and_offset(&self) -> TypeAndOffset {
        self.type_and_offset
    }
}

// ── Beacon (C0T0) mappings, 51-frame multiframe ─────────────────────────────

pub const FCCH_MAPPING: TdmaMapping =
    TdmaMapping::new(0x01, true, &[0, 10, 20, 30, 40], 51, TypeAndOffset::Fcch);

pub const SCH_MAPPING: TdmaMapping =
    TdmaMapping::new(0x01, true, &[1, 11, 21, 31, 41], 51, TypeAndOffset::Sch);

pub const BCCH_MAPPING: TdmaMapping =
    TdmaMapping::new(0x01, true, &[2, 3, 4, 5], 51, TypeAndOffset::Bcch);

static CCCH_FRAMES: [[u32; 4]; 3] = [[6, 7, 8, 9], [12, 13, 14, 15], [16, 17, 18, 19]];

/// One of the first three CCCH blocks of a non-combined C-V beacon.
pub fn ccch_mapping(block: u8) -> TdmaMapping {
    let block = block as usize;
    assert!(block < CCCH_FRAMES.len(), "unsupported CCCH block {}", block);
    TdmaMapping::new(0x01, true, &CCCH_FRAMES[block], 51, TypeAndOffset::Ccch(block as u8))
}

const RACH_FRAMES: [u32; 51] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48,
    49, 50,
];

/// Full-rate RACH on the uplink of TN0: every frame is an access opportunity.
pub const RACH_MAPPING: TdmaMapping =
    TdmaMapping::new(0x01, false, &RACH_FRAMES, 51, TypeAndOffset::Rach);

// ── SDCCH/8 and its SACCH, 51- and 102-frame multiframes ────────────────────

static SDCCH8_DL_FRAMES: [[u32; 4]; 8] = [
    [0, 1, 2, 3],
    [4, 5, 6, 7],
    [8, 9, 10, 11],
    [12, 13, 14, 15],
    [16, 17, 18, 19],
    [20, 21, 22, 23],
    [24, 25, 26, 27],
    [28, 29, 30, 31],
];

// Uplink SDCCH runs 15 frames after the downlink (GSM 05.02 Clause 7).
static SDCCH8_UL_FRAMES: [[u32; 4]; 8] = [
    [15, 16, 17, 18],
    [19, 20, 21, 22],
    [23, 24, 25, 26],
    [27, 28, 29, 30],
    [31, 32, 33, 34],
    [35, 36, 37, 38],
    [39, 40, 41, 42],
    [43, 44, 45, 46],
];

// SACCH/C8 alternates between the two halves of a 102-frame period:
// subchannels 0-3 in the even 51-multiframe, 4-7 in the odd one.
static SACCH8_DL_FRAMES: [[u32; 4]; 8] = [
    [32, 33, 34, 35],
    [36, 37, 38, 39],
    [40, 41, 42, 43],
    [44, 45, 46, 47],
    [83, 84, 85, 86],
    [87, 88, 89, 90],
    [91, 92, 93, 94],
    [95, 96, 97, 98],
];

static SACCH8_UL_FRAMES: [[u32; 4]; 8] = [
    [47, 48, 49, 50],
    [51, 52, 53, 54],
    [55, 56, 57, 58],
    [59, 60, 61, 62],
    [98, 99, 100, 101],
    [0, 1, 2, 3],
    [4, 5, 6, 7],
    [8, 9, 10, 11],
];

pub fn sdcch8_mapping(subchannel: u8, downlink: bool) -> TdmaMapping {
    let sub = subchannel as usize;
    assert!(sub < 8, "SDCCH/8 subchannel {} out of range", subchannel);
    let frames: &'static [u32] = if downlink { &SDCCH8_DL_FRAMES[sub] } else { &SDCCH8_UL_FRAMES[sub] };
    TdmaMapping::new(0xff, downlink, frames, 51, TypeAndOffset::Sdcch8(subchannel))
}

pub fn sacch8_mapping(subchannel: u8, downlink: bool) -> TdmaMapping {
    let sub = subchannel as usize;
    assert!(sub < 8, "SACCH/C8 subchannel {} out of range", subchannel);
    let frames: &'static [u32] = if downlink { &SACCH8_DL_FRAMES[sub] } else { &SACCH8_UL_FRAMES[sub] };
    TdmaMapping::new(0xff, downlink, frames, 102, TypeAndOffset::Sacch8(subchannel))
}

// ── Traffic channels, 26-frame multiframe ───────────────────────────────────

static TCHF_FRAMES: [u32; 24] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
];

/// Full-rate traffic channel; frame 12 is the SACCH, frame 25 idles.
pub fn tchf_mapping(downlink: bool) -> TdmaMapping {
    TdmaMapping::new(0xfe, downlink, &TCHF_FRAMES, 26, TypeAndOffset::TchF)
}

static SACCH_TF_EVEN_FRAMES: [u32; 4] = [12, 38, 64, 90];
static SACCH_TF_ODD_FRAMES: [u32; 4] = [25, 51, 77, 103];

/// SACCH for a full-rate TCH: 104-frame period, frame 12 of each
/// 26-multiframe for even timeslots, frame 25 for odd ones.
pub fn sacch_tf_mapping(tn: u8, downlink: bool) -> TdmaMapping {
    assert!(tn < 8);
    let frames: &'static [u32] =
        if tn % 2 == 0 { &SACCH_TF_EVEN_FRAMES } else { &SACCH_TF_ODD_FRAMES };
    TdmaMapping::new(1 << tn, downlink, frames, 104, TypeAndOffset::SacchTf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_is_inverse_of_forward() {
        let maps = [
            BCCH_MAPPING,
            SCH_MAPPING,
            sdcch8_mapping(3, true),
            sacch8_mapping(5, false),
            tchf_mapping(true),
            sacch_tf_mapping(2, true),
        ];
        for m in maps {
            for i in 0..m.num_frames() {
                let frame = m.frame_mapping(i);
                assert_eq!(m.reverse_mapping(frame), Some(i));
                // Same offset in a later period maps to the same burst index
                assert_eq!(m.reverse_mapping(frame + 4 * m.repeat_length()), Some(i));
            }
        }
    }

    #[test]
    fn test_reverse_rejects_foreign_frames() {
        // Frame 10 is FCCH, not BCCH
        assert_eq!(BCCH_MAPPING.reverse_mapping(10), None);
        // Frame 12 is the SACCH gap in the TCH multiframe
        assert_eq!(tchf_mapping(true).reverse_mapping(12), None);
    }

    #[test]
    fn test_allowed_slots() {
        assert!(BCCH_MAPPING.allowed_slot(0));
        assert!(!BCCH_MAPPING.allowed_slot(3));
        assert!(tchf_mapping(true).allowed_slot(5));
        assert!(!tchf_mapping(true).allowed_slot(0));
        assert!(sacch_tf_mapping(2, true).allowed_slot(2));
        assert!(!sacch_tf_mapping(2, true).allowed_slot(3));
    }

    #[test]
    fn test_frame_mapping_wraps_block() {
        let m = BCCH_MAPPING;
        assert_eq!(m.frame_mapping(0), 2);
        assert_eq!(m.frame_mapping(4), 2);
        assert_eq!(m.frame_mapping(7), 5);
    }
}
