//! Shared transmit-side machinery: burst-time bookkeeping against the shared
//! clock, idle fill, and the channel lifecycle flags.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use gsm_core::{GsmTime, TdmaMapping, TxBurst, TypeAndOffset};
use gsm_saps::{ArfcnRadio, SapMux};

use crate::clock::CancelToken;
use crate::l1fec::{DecoderHalf, L1Context};

/// An encoder may fall at most this many frames behind (or ahead of) the
/// clock before it is reseated; one 51x26 superframe.
const RESYNC_WINDOW_FRAMES: i32 = 51 * 26;

pub struct SchedState {
    pub total_bursts: u32,
    pub prev_write_time: GsmTime,
    pub next_write_time: GsmTime,
    pub active: bool,
    pub running: bool,
}

pub struct EncoderCore {
    ctx: L1Context,
    mapping: TdmaMapping,
    tn: u8,
    /// Training sequence code, fixed to the BCC
    tsc: u8,
    filler: TxBurst,
    radio: OnceLock<Arc<dyn ArfcnRadio>>,
    upstream: OnceLock<Arc<dyn SapMux>>,
    sibling: OnceLock<Weak<dyn DecoderHalf>>,
    cancel: CancelToken,
    sched: Mutex<SchedState>,
}

impl EncoderCore {
    pub fn new(ctx: L1Context, tn: u8, mapping: TdmaMapping, filler: TxBurst) -> EncoderCore {
        assert!(mapping.allowed_slot(tn), "{} not allowed on TN {}", mapping.type_and_offset(), tn);
        assert!(mapping.downlink(), "{} is not a downlink channel", mapping.type_and_offset());

        let tsc = ctx.bcc();
        let mut t = ctx.clock.now_time().with_tn(tn);
        t.roll_forward(mapping.frame_mapping(0), mapping.repeat_length());
        let sched = SchedState {
            total_bursts: 0,
            prev_write_time: t,
            next_write_time: t,
            active: false,
            running: false,
        };

        EncoderCore {
            ctx,
            mapping,
            tn,
            tsc,
            filler,
            radio: OnceLock::new(),
            upstream: OnceLock::new(),
            sibling: OnceLock::new(),
            cancel: CancelToken::new(),
            sched: Mutex::new(sched),
        }
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

    pub fn tsc(&self) -> u8 {
        self.tsc
    }

    pub fn type_and_offset(&self) -> TypeAndOffset {
        self.mapping.type_and_offset()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn set_downstream(&self, radio: Arc<dyn ArfcnRadio>) {
        if self.radio.set(radio).is_err() {
            tracing::warn!("{}: downstream radio already attached", self.type_and_offset());
        }
    }

    pub fn radio(&self) -> Option<&Arc<dyn ArfcnRadio>> {
        self.radio.get()
    }

    pub fn arfcn(&self) -> u16 {
        self.radio.get().expect("encoder has no downstream radio").arfcn()
    }

    pub fn set_upstream(&self, mux: Arc<dyn SapMux>) {
        if self.upstream.set(mux).is_err() {
            tracing::warn!("{}: upstream already attached", self.type_and_offset());
        }
    }

    pub fn upstream(&self) -> Option<&Arc<dyn SapMux>> {
        self.upstream.get()
    }

    pub fn set_sibling(&self, sibling: Weak<dyn DecoderHalf>) {
        let _ = self.sibling.set(sibling);
    }

    pub fn sibling(&self) -> Option<Arc<dyn DecoderHalf>> {
        self.sibling.get().and_then(|w| w.upgrade())
    }

    pub fn lock_sched(&self) -> MutexGuard<'_, SchedState> {
        self.sched.lock().expect("encoder sched lock poisoned")
    }

    pub fn open(&self) {
        tracing::debug!("{}: open", self.type_and_offset());
        let mut s = self.lock_sched();
        s.running = true;
        s.total_bursts = 0;
        s.active = true;
        self.resync_locked(&mut s);
    }

    /// Close and flush the idle pattern so the slot does not go dark
    /// mid-block. Does not return until the fill is submitted.
    pub fn close(&self) {
        tracing::debug!("{}: close", self.type_and_offset());
        let mut s = self.lock_sched();
        s.active = false;
        self.send_idle_fill_locked(&mut s);
    }

    pub fn active(&self) -> bool {
        let active = self.lock_sched().active;
        match self.sibling() {
            Some(sib) => active && !sib.recyclable(),
            None => active,
        }
    }

    /// If the encoder's clock is far from the current BTS clock, get it
    /// caught up to something reasonable.
    pub fn resync_locked(&self, s: &mut SchedState) {
        let now = self.ctx.clock.now_time();
        let delta = s.next_write_time.diff(now);
        if !(0..=RESYNC_WINDOW_FRAMES).contains(&delta) {
            s.next_write_time = now.with_tn(self.tn);
            s.next_write_time
                .roll_forward(self.mapping.frame_mapping(s.total_bursts as usize), self.mapping.repeat_length());
            tracing::debug!("{}: resync to {}", self.type_and_offset(), s.next_write_time);
        }
    }

    /// Advance to the next transmission slot, GSM 05.02 Clause 7.
    /// Callers signal the new write time upstream after dropping the lock.
    pub fn roll_forward_locked(&self, s: &mut SchedState) {
        s.prev_write_time = s.next_write_time;
        s.total_bursts = s.total_bursts.wrapping_add(1);
        s.next_write_time
            .roll_forward(self.mapping.frame_mapping(s.total_bursts as usize), self.mapping.repeat_length());
    }

    /// Tell the upper layer when the next frame can go out.
    pub fn signal_next_wtime(&self, next: GsmTime) {
        if let Some(mux) = self.upstream.get() {
            mux.signal_next_wtime(next);
        }
    }

    /// Block until the BTS clock catches up to the most recently transmitted
    /// burst, so the caller runs at most one slot ahead of real time.
    pub fn wait_to_send(&self) {
        let prev = self.lock_sched().prev_write_time;
        self.ctx.clock.wait_until(prev, &self.cancel);
    }

    /// Stamp and submit the filler pattern for one full mapping period.
    /// For C0 that is the dummy burst.
    pub fn send_idle_fill_locked(&self, s: &mut SchedState) {
        let Some(radio) = self.radio.get() else {
            tracing::warn!("{}: no downstream radio, dropping idle fill", self.type_and_offset());
            return;
        };
        self.resync_locked(s);
        for _ in 0..self.mapping.num_frames() {
            let mut burst = self.filler.clone();
            burst.set_time(s.next_write_time);
            radio.write_high_side(burst);
            self.roll_forward_locked(s);
        }
    }
}
