//! Channel lifecycle timers (T3101, T3109, T3111).

use std::time::{Duration, Instant};

/// A one-shot countdown timer with three observable states:
/// inactive, active (set and still counting) and expired.
#[derive(Debug, Clone, Copy)]
pub struct L1Timer {
    duration: Duration,
    started: Option<Instant>,
}

impl L1Timer {
    pub fn new(duration: Duration) -> L1Timer {
        L1Timer { duration, started: None }
    }

    pub fn from_millis(ms: u64) -> L1Timer {
        Self::new(Duration::from_millis(ms))
    }

    /// Start, or restart, the countdown.
    pub fn set(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Return to the inactive state.
    pub fn reset(&mut self) {
        self.started = None;
    }

    /// True iff the timer has been set and not reset. A timer stays active
    /// in the protocol sense even after its timeout elapses.
    pub fn active(&self) -> bool {
        self.started.is_some()
    }

    /// True iff the timer is active and its timeout has elapsed.
    pub fn expired(&self) -> bool {
        match self.started {
            Some(t0) => t0.elapsed() >= self.duration,
            None => false,
        }
    }
}
