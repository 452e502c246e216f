//! Radio bursts and their on-air constants.
//!
//! A burst is 148 symbols on one timeslot, laid out as
//! `[3 tail | 57 data1 | Hl | 26 training | Hu | 57 data2 | 3 tail]`.
//! `TxBurst` carries hard bits toward the radio; `RxBurst` carries
//! soft-decision symbols in `[0,1]` (0.5 = erasure) plus the physical
//! measurements the radio attached to the burst.

use core::fmt;

use crate::tdma_time::GsmTime;

pub const BURST_BITS: usize = 148;

/// Field offsets within a normal burst.
pub const BURST_DATA1: usize = 3;
pub const BURST_HL: usize = 60;
pub const BURST_TRAINING: usize = 61;
pub const BURST_HU: usize = 87;
pub const BURST_DATA2: usize = 88;

/// Offsets of the two halves of a synchronization burst.
pub const SCH_DATA1: usize = 3;
pub const SCH_TRAINING: usize = 42;
pub const SCH_DATA2: usize = 106;

/// Offset and length of the coded payload of an access burst.
pub const ACCESS_DATA: usize = 49;
pub const ACCESS_DATA_BITS: usize = 36;

/// Normal-burst training sequences, GSM 05.02 5.2.3. Indexed by TSC.
pub const TRAINING_SEQUENCE: [[u8; 26]; 8] = [
    [0, 0, 1, 0, 0, 1, 0, 1, 1, 1, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 0, 1, 1, 1],
    [0, 0, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1, 1],
    [0, 1, 0, 0, 0, 0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 0, 0, 1, 0, 0, 0, 0, 1, 1, 1, 0],
    [0, 1, 0, 0, 0, 1, 1, 1, 1, 0, 1, 1, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 1, 1, 1, 0],
    [0, 0, 0, 1, 1, 0, 1, 0, 1, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 1, 1, 0, 1, 0, 1, 1],
    [0, 1, 0, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0, 0, 0, 0, 1, 0, 0, 1, 1, 1, 0, 1, 0],
    [1, 0, 1, 0, 0, 1, 1, 1, 1, 1, 0, 1, 1, 0, 0, 0, 1, 0, 1, 0, 0, 1, 1, 1, 1, 1],
    [1, 1, 1, 0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1, 0, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0],
];

/// Synchronization-burst extended training sequence, GSM 05.02 5.2.5.
pub const SCH_TRAINING_SEQUENCE: [u8; 64] = [
    1, 0, 1, 1, 1, 0, 0, 1, 0, 1, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 1, 1,
    1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 1, 0, 0, 0, 1, 0, 1, 0, 1, 1, 1, 0, 1, 1, 0, 0, 0, 0, 1, 1, 0,
    1, 1,
];

/// C0 filler: the dummy burst of GSM 05.02 5.2.6.
pub const DUMMY_BURST: [u8; BURST_BITS] = [
    0, 0, 0, //
    1, 1, 1, 1, 1, 0, 1, 1, 0, 1, 1, 1, 0, 1, 1, 0, 0, 0, 0, 0, 1, 0, 1, 0, 0, 1, 0, 0, 1, 1, 1,
    0, 0, 0, 0, 0, 1, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 0, 0, 0, 1, 1, 1,
    0, 0, 0, 1, 0, 1, 1, 1, 0, 0, 0, 1, 0, 1, 1, 1, 0, 0, 0, 1, 0, 1, 0, 1, 1, 1, 0, 1, 0, 0, 1,
    0, 1, 0, 0, 1, 0, 1, 1, 1, 1, 1, 0, 1, 0, 0, 1, 0, 0, 0, 1, 1, 0, 1, 0, 1, 1, 1, 1, 0, 1, 1,
    0, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 0, 1, 1, 0, 0, 1, 0, //
    0, 0, 0,
];

/// Outgoing burst: 148 hard bits stamped with the transmit time.
#[derive(Clone)]
pub struct TxBurst {
    bits: [u8; BURST_BITS],
    time: GsmTime,
}

impl TxBurst {
    pub fn new() -> TxBurst {
        TxBurst { bits: [0; BURST_BITS], time: GsmTime::default() }
    }

    /// The C0 idle filler burst.
    pub fn dummy() -> TxBurst {
        TxBurst { bits: DUMMY_BURST, time: GsmTime::default() }
    }

    pub fn time(&self) -> GsmTime {
        self.time
    }

    pub fn set_time(&mut self, time: GsmTime) {
        self.time = time;
    }

    pub fn bits(&self) -> &[u8; BURST_BITS] {
        &self.bits
    }

    pub fn set_hl(&mut self, v: bool) {
        self.bits[BURST_HL] = v as u8;
    }

    pub fn set_hu(&mut self, v: bool) {
        self.bits[BURST_HU] = v as u8;
    }

    /// Write the normal-burst training sequence for the given TSC.
    pub fn set_training(&mut self, tsc: u8) {
        self.copy_to_segment(&TRAINING_SEQUENCE[tsc as usize], BURST_TRAINING);
    }

    /// Copy a bit array into the burst starting at `pos`.
    pub fn copy_to_segment(&mut self, src: &[u8], pos: usize) {
        self.bits[pos..pos + src.len()].copy_from_slice(src);
    }
}

impl Default for TxBurst {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TxBurst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxBurst {{ time {} ", self.time)?;
        for &b in self.bits.iter() {
            write!(f, "{}", b)?;
        }
        write!(f, " }}")
    }
}

/// Incoming burst: 148 soft symbols plus the radio's measurements.
#[derive(Clone)]
pub struct RxBurst {
    soft: [f32; BURST_BITS],
    time: GsmTime,
    /// Received signal strength in dB with respect to full scale
    rssi: f32,
    /// Timing error in symbol intervals
    timing_error: f32,
}

impl RxBurst {
    pub fn new(soft: [f32; BURST_BITS], time: GsmTime, rssi: f32, timing_error: f32) -> RxBurst {
        RxBurst { soft, time, rssi, timing_error }
    }

    /// Loopback construction: a received burst with ideal symbol values,
    /// as the radio would deliver it with no channel impairment.
    pub fn from_tx(burst: &TxBurst, rssi: f32, timing_error: f32) -> RxBurst {
        let mut soft = [0.0f32; BURST_BITS];
        for (s, &b) in soft.iter_mut().zip(burst.bits().iter()) {
            *s = b as f32;
        }
        RxBurst { soft, time: burst.time(), rssi, timing_error }
    }

    pub fn time(&self) -> GsmTime {
        self.time
    }

    pub fn rssi(&self) -> f32 {
        self.rssi
    }

    pub fn timing_error(&self) -> f32 {
        self.timing_error
    }

    pub fn segment(&self, pos: usize, len: usize) -> &[f32] {
        &self.soft[pos..pos + len]
    }

    pub fn data1(&self) -> &[f32] {
        self.segment(BURST_DATA1, 57)
    }

    pub fn data2(&self) -> &[f32] {
        self.segment(BURST_DATA2, 57)
    }

    pub fn hl(&self) -> bool {
        self.soft[BURST_HL] > 0.5
    }

    pub fn hu(&self) -> bool {
        self.soft[BURST_HU] > 0.5
    }
}

impl fmt::Debug for RxBurst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RxBurst {{ time {} RSSI {:.1} timingError {:.2} }}",
            self.time, self.rssi, self.timing_error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_layout() {
        // 3 + 57 + 1 + 26 + 1 + 57 + 3 == 148
        assert_eq!(BURST_DATA1 + 57, BURST_HL);
        assert_eq!(BURST_HL + 1, BURST_TRAINING);
        assert_eq!(BURST_TRAINING + 26, BURST_HU);
        assert_eq!(BURST_HU + 1, BURST_DATA2);
        assert_eq!(BURST_DATA2 + 57 + 3, BURST_BITS);
    }

    #[test]
    fn test_stealing_flags_roundtrip() {
        let mut tx = TxBurst::new();
        tx.set_hl(true);
        tx.set_hu(false);
        let rx = RxBurst::from_tx(&tx, -60.0, 0.0);
        assert!(rx.hl());
        assert!(!rx.hu());
    }

    #[test]
    fn test_training_sequence_placement() {
        let mut tx = TxBurst::new();
        tx.set_training(2);
        assert_eq!(&tx.bits()[BURST_TRAINING..BURST_TRAINING + 26], &TRAINING_SEQUENCE[2]);
    }

    #[test]
    fn test_dummy_burst_tails() {
        let b = TxBurst::dummy();
        assert_eq!(&b.bits()[0..3], &[0, 0, 0]);
        assert_eq!(&b.bits()[145..148], &[0, 0, 0]);
    }
}
