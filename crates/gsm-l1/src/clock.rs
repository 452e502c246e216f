//! The shared BTS TDMA clock and the cancellation token service threads
//! block on.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use gsm_core::tdma_time::{frame_diff, FRAME_MICROSECONDS};
use gsm_core::{GsmTime, HYPERFRAME};

/// Cooperative cancellation for service threads. Cancelling wakes every
/// thread currently sleeping in `wait_timeout`.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken { inner: Arc::new((Mutex::new(false), Condvar::new())) }
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().expect("CancelToken lock poisoned") = true;
        cvar.notify_all();
    }

    pub fn cancelled(&self) -> bool {
        *self.inner.0.lock().expect("CancelToken lock poisoned")
    }

    /// Sleep for up to `timeout`; returns true if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().expect("CancelToken lock poisoned");
        if *guard {
            return true;
        }
        let (guard, _) = cvar.wait_timeout(guard, timeout).expect("CancelToken lock poisoned");
        *guard
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic TDMA frame clock shared by every channel on the BTS.
///
/// The frame number advances in real time from a settable base; the radio
/// corrects the base when its own timebase drifts.
pub struct BtsClock {
    base: Mutex<(Instant, u32)>,
}

impl BtsClock {
    pub fn new() -> BtsClock {
        BtsClock { base: Mutex::new((Instant::now(), 0)) }
    }

    /// Set the clock to a frame number, e.g. from a radio timestamp.
    pub fn set(&self, frame: u32) {
        let mut base = self.base.lock().expect("BtsClock lock poisoned");
        *base = (Instant::now(), frame % HYPERFRAME);
    }

    /// Current frame number.
    pub fn now(&self) -> u32 {
        let base = self.base.lock().expect("BtsClock lock poisoned");
        let elapsed_micros = base.0.elapsed().as_micros() as u64;
        let elapsed_frames = ((elapsed_micros / FRAME_MICROSECONDS) % HYPERFRAME as u64) as u32;
        (base.1 + elapsed_frames) % HYPERFRAME
    }

    /// Current time on timeslot 0.
    pub fn now_time(&self) -> GsmTime {
        GsmTime { f: self.now(), t: 0 }
    }

    /// Block until the clock reaches the frame of `when`, or the token is
    /// cancelled. Returns true if cancelled.
    pub fn wait_until(&self, when: GsmTime, cancel: &CancelToken) -> bool {
        loop {
            let remaining = frame_diff(when.f, self.now());
            if remaining <= 0 {
                return cancel.cancelled();
            }
            let sleep = Duration::from_micros(remaining as u64 * FRAME_MICROSECONDS);
            // Cap each nap so cancellation is prompt even for long waits
            if cancel.wait_timeout(sleep.min(Duration::from_millis(100))) {
                return true;
            }
        }
    }
}

impl Default for BtsClock {
    fn default() -> Self {
        Self::new()
    }
}
