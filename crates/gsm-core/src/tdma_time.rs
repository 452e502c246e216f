use core::fmt;

/// GSM hyperframe length in frames: 26 x 51 x 2048.
/// All frame-number arithmetic is modular over this value.
pub const HYPERFRAME: u32 = 26 * 51 * 2048;

/// Duration of one TDMA frame in microseconds (120 ms / 26).
pub const FRAME_MICROSECONDS: u64 = 4615;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GsmTime {
    /// Frame number, 0 to HYPERFRAME-1
    pub f: u32,
    /// Timeslot number, 0 to 7
    pub t: u8,
}

impl Default for GsmTime {
    fn default() -> GsmTime {
        GsmTime { f: 0, t: 0 }
    }
}

/// Difference between two frame numbers, handling hyperframe wrap-around.
pub fn frame_diff(a: u32, b: u32) -> i32 {
    let mut diff = a as i64 - b as i64;
    let wrap = HYPERFRAME as i64;
    while diff < -wrap / 2 {
        diff += wrap;
    }
    while diff >= wrap / 2 {
        diff -= wrap;
    }
    diff as i32
}

impl GsmTime {
    pub fn new(f: u32, t: u8) -> GsmTime {
        assert!(f < HYPERFRAME && t < 8, "invalid TDMA time {}:{}", f, t);
        GsmTime { f, t }
    }

    pub fn is_valid(self) -> bool {
        self.f < HYPERFRAME && self.t < 8
    }

    /// Add a (possibly negative) number of frames, keeping the timeslot.
    pub fn add_frames(self, num_frames: i32) -> GsmTime {
        let f = (self.f as i64 + num_frames as i64).rem_euclid(HYPERFRAME as i64) as u32;
        GsmTime { f, t: self.t }
    }

    /// Same frame number on another timeslot.
    pub fn with_tn(self, t: u8) -> GsmTime {
        assert!(t < 8);
        GsmTime { f: self.f, t }
    }

    /// Frame difference `self - b`, wrap-aware.
    pub fn diff(self, b: Self) -> i32 {
        frame_diff(self.f, b.f)
    }

    /// Advance the frame number to the next position within `period` whose
    /// offset equals `target`. Stays put if already there. Implements the
    /// transmit side of GSM 05.02 Clause 7.
    pub fn roll_forward(&mut self, target: u32, period: u32) {
        assert!(period > 0 && period < HYPERFRAME);
        assert!(target < period, "roll_forward: target {} outside period {}", target, period);
        let delta = (target + period - self.f % period) % period;
        self.f = (self.f + delta) % HYPERFRAME;
    }
}

impl fmt::Display for GsmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.f, self.t)
    }
}

impl fmt::Debug for GsmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.f, self.t)
    }
}
