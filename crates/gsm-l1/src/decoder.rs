//! Shared receive-side machinery: frame counters with the FER estimator,
//! lifecycle timers, and the per-burst physical measurement rings.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use gsm_core::{GsmTime, RxBurst, TdmaMapping, TypeAndOffset};
use gsm_saps::SapMux;

use crate::components::timers::L1Timer;
use crate::l1fec::L1Context;

/// Memory of the one-pole frame-erasure-rate filter.
const FER_MEMORY: f32 = 208.0;

pub struct DecoderState {
    pub active: bool,
    pub running: bool,
    pub fer: f32,
    /// Initial-assignment timer; reset by the first good uplink frame
    pub t3101: L1Timer,
    /// Link-loss timer; restarted by every good frame
    pub t3109: L1Timer,
    /// Release-delay timer; armed on close
    pub t3111: L1Timer,
    /// The handset's settings change every 4 bursts, so measurements are
    /// averaged over a four-element ring.
    pub rssi: [f32; 4],
    pub timing_error: [f32; 4],
    pub rssi_counter: usize,
    /// Set when a new measurement lands, cleared when it is read
    pub phy_new: bool,
    /// Time of the first burst of the block being assembled
    pub read_time: GsmTime,
}

pub struct DecoderCore {
    ctx: L1Context,
    mapping: TdmaMapping,
    tn: u8,
    upstream: OnceLock<Arc<dyn SapMux>>,
    state: Mutex<DecoderState>,
}

impl DecoderCore {
    pub fn new(ctx: L1Context, tn: u8, mapping: TdmaMapping) -> DecoderCore {
        assert!(mapping.allowed_slot(tn), "{} not allowed on TN {}", mapping.type_and_offset(), tn);
        assert!(!mapping.downlink(), "{} is not an uplink channel", mapping.type_and_offset());

        let timers = ctx.config.config().timers;
        let state = DecoderState {
            active: false,
            running: false,
            fer: 0.0,
            t3101: L1Timer::from_millis(timers.t3101_ms),
            t3109: L1Timer::from_millis(timers.t3109_ms),
            t3111: L1Timer::from_millis(timers.t3111_ms),
            rssi: [0.0; 4],
            timing_error: [0.0; 4],
            rssi_counter: 0,
            phy_new: false,
            read_time: GsmTime::default(),
        };
        DecoderCore { ctx, mapping, tn, upstream: OnceLock::new(), state: Mutex::new(state) }
    }

    pub fn ctx(&self) -> &L1Context {
        &self.ctx
    }

    pub fn mapping(&self) -> &TdmaMapping {
        &self.mapping
    }

    pub fn tn(&self) -> u8 {
        self.tn
    }

    pub fn type_and_offset(&self) -> TypeAndOffset {
        self.mapping.type_and_offset()
    }

    pub fn set_upstream(&self, mux: Arc<dyn SapMux>) {
        if self.upstream.set(mux).is_err() {
            tracing::warn!("{}: upstream already attached", self.type_and_offset());
        }
    }

    pub fn upstream(&self) -> Option<&Arc<dyn SapMux>> {
        self.upstream.get()
    }

    pub fn lock_state(&self) -> MutexGuard<'_, DecoderState> {
        self.state.lock().expect("decoder state lock poisoned")
    }

    /// Arm the assignment and link-loss timers and start accepting bursts.
    pub fn open(&self) {
        tracing::debug!("{}: open", self.type_and_offset());
        let mut st = self.lock_state();
        st.running = true;
        st.fer = 0.0;
        st.t3111.reset();
        st.t3109.set();
        st.t3101.set();
        st.active = true;
    }

    /// Stop accepting bursts and arm the release-delay timer; the channel
    /// becomes recyclable when it expires.
    pub fn close(&self) {
        tracing::debug!("{}: close", self.type_and_offset());
        let mut st = self.lock_state();
        st.t3101.reset();
        st.t3109.reset();
        st.t3111.set();
        st.active = false;
    }

    pub fn active(&self) -> bool {
        let st = self.lock_state();
        st.active && !Self::recyclable_locked(&st)
    }

    pub fn recyclable(&self) -> bool {
        Self::recyclable_locked(&self.lock_state())
    }

    pub fn recyclable_locked(st: &DecoderState) -> bool {
        st.t3101.expired() || st.t3109.expired() || st.t3111.expired()
    }

    /// Good frame: decay the FER filter and keep the channel alive.
    pub fn count_good_frame_locked(&self, st: &mut DecoderState) {
        let a = 1.0 / FER_MEMORY;
        let b = 1.0 - a;
        st.fer *= b;
        st.t3109.set();
        if st.t3101.active() {
            st.t3101.reset();
        }
        tracing::trace!("{}: FER={:.4}", self.type_and_offset(), st.fer);
    }

    /// Bad frame: advance the FER filter. Timers are unaffected by a single
    /// loss.
    pub fn count_bad_frame_locked(&self, st: &mut DecoderState) {
        let a = 1.0 / FER_MEMORY;
        let b = 1.0 - a;
        st.fer = b * st.fer + a;
        tracing::trace!("{}: FER={:.4}", self.type_and_offset(), st.fer);
    }

    /// Record the physical measurements of one burst into the rings.
    pub fn process_phy_locked(&self, st: &mut DecoderState, burst: &RxBurst) {
        let i = st.rssi_counter;
        st.rssi[i] = burst.rssi();
        st.timing_error[i] = burst.timing_error();
        st.rssi_counter = (i + 1) % 4;
        st.phy_new = true;
    }

    /// Mean uplink RSSI over the ring; clears the new-measurement flag.
    pub fn rssi_locked(st: &mut DecoderState) -> f32 {
        st.phy_new = false;
        st.rssi.iter().sum::<f32>() * 0.25
    }

    /// Mean uplink timing error over the ring; clears the new-measurement
    /// flag.
    pub fn timing_error_locked(st: &mut DecoderState) -> f32 {
        st.phy_new = false;
        st.timing_error.iter().sum::<f32>() * 0.25
    }

    /// Timing advance to report upstream, clamped to the 6-bit field.
    pub fn ta_locked(st: &mut DecoderState) -> u8 {
        let ta = (Self::timing_error_locked(st) + 0.5).floor();
        ta.clamp(0.0, 63.0) as u8
    }

    /// Burst index within the interleaver block, from the reverse mapping.
    /// A frame that cannot be mapped means the demux is misconfigured.
    pub fn burst_index(&self, time: GsmTime, modulus: usize) -> usize {
        let b = self
            .mapping
            .reverse_mapping(time.f)
            .unwrap_or_else(|| panic!("{}: demux misconfigured for frame {}", self.type_and_offset(), time));
        b % modulus
    }
}
