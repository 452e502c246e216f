//! RACH decoder, GSM 05.03 4.6.
//!
//! Receive-only channel. Bursts from the radio thread land in a bounded
//! queue and a dedicated service thread decodes them, so a blocking
//! allocator in the upper layers cannot stall the receive path.

use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, RecvTimeoutError};

use gsm_core::bits::{lsb8msb, peek_field};
use gsm_core::burst::{ACCESS_DATA, ACCESS_DATA_BITS};
use gsm_core::{RxBurst, TdmaMapping};
use gsm_saps::{BurstSink, FramePrimitive, L2Frame, SapMux};

use crate::components::parity::{
    ParityBlockCoder, RACH_CODEWORD_BITS, RACH_GENERATOR, RACH_PARITY_BITS,
};
use crate::components::viterbi::{decode_soft, GsmViterbiDecoder};
use crate::decoder::DecoderCore;
use crate::gsmtap::{tap, TapMeta, TAP_BURST_ACCESS};
use crate::l1fec::{DecoderHalf, L1Context};

/// Access bursts awaiting decode; radio drops beyond this.
const RACH_QUEUE_DEPTH: usize = 64;

const RACH_UNCODED_BITS: usize = 18;

struct RachRx {
    u: [u8; RACH_UNCODED_BITS],
    coder: ParityBlockCoder,
    vdec: GsmViterbiDecoder,
}

pub struct RachDecoder {
    core: DecoderCore,
    queue: (Sender<RxBurst>, Receiver<RxBurst>),
    rx: Mutex<RachRx>,
    thread: Mutex<Option<JoinHandle<()>>>,
    self_weak: Weak<RachDecoder>,
}

impl RachDecoder {
    pub fn new(ctx: L1Context, tn: u8, mapping: TdmaMapping) -> Arc<RachDecoder> {
        Arc::new_cyclic(|weak| RachDecoder {
            core: DecoderCore::new(ctx, tn, mapping),
            queue: bounded(RACH_QUEUE_DEPTH),
            rx: Mutex::new(RachRx {
                u: [0; RACH_UNCODED_BITS],
                coder: ParityBlockCoder::new(RACH_GENERATOR, RACH_PARITY_BITS, RACH_CODEWORD_BITS),
                vdec: GsmViterbiDecoder::new(),
            }),
            thread: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }

    /// Decode one access burst. With 4 tail and 6 parity bits the false
    /// alarm rate on random noise is about 1/1024.
    fn process_burst(&self, burst: &RxBurst) {
        let (valid, ra) = {
            let mut guard = self.rx.lock().expect("decoder fec lock poisoned");
            let rx = &mut *guard;
            let e = burst.segment(ACCESS_DATA, ACCESS_DATA_BITS);
            decode_soft(&rx.vdec, e, &mut rx.u);

            // Tail bits must all be zero
            if peek_field(&rx.u, 14, 4) != 0 {
                (false, 0)
            } else {
                // The parity word is XOR'd with the BSIC (GSM 05.03 4.6)
                let sent_parity = !peek_field(&rx.u, 8, 6);
                let check_parity = rx.coder.parity(&rx.u[0..8]);
                let encoded_bsic = (sent_parity ^ check_parity) & 0x3f;
                if encoded_bsic as u8 != self.core.ctx().bsic() {
                    (false, 0)
                } else {
                    // The payload is the 8-bit RA of GSM 04.08 9.1.8
                    lsb8msb(&mut rx.u[0..8]);
                    (true, peek_field(&rx.u, 0, 8) as u8)
                }
            }
        };

        if !valid {
            let mut st = self.core.lock_state();
            self.core.count_bad_frame_locked(&mut st);
            return;
        }

        let fer = {
            let mut st = self.core.lock_state();
            self.core.count_good_frame_locked(&mut st);
            st.fer
        };

        // The channel assignment procedure needs the RA, the burst time and
        // an initial timing advance from the measured delay.
        let initial_ta = (burst.timing_error() + 0.5).floor().clamp(0.0, 63.0) as u8;
        tracing::info!(
            "{}: RA={:#04x} time={} RSSI={:.1} timingError={:.2} TA={}",
            self.core.type_and_offset(),
            ra,
            burst.time(),
            burst.rssi(),
            burst.timing_error(),
            initial_ta
        );

        tap(
            &self.core.ctx().tap,
            TapMeta {
                arfcn: 0,
                tn: burst.time().t,
                frame: burst.time().f,
                chan: self.core.type_and_offset(),
                uplink: true,
                subtype: TAP_BURST_ACCESS,
            },
            &[ra],
        );

        let Some(mux) = self.core.upstream() else {
            tracing::warn!("{}: no upstream connected, dropping access", self.core.type_and_offset());
            return;
        };
        mux.write_low_side(
            L2Frame::new(FramePrimitive::Data, vec![ra]),
            burst.time(),
            burst.rssi(),
            initial_ta,
            fer,
        );
    }

    fn service_loop(&self) {
        tracing::debug!("{}: service thread up", self.core.type_and_offset());
        loop {
            match self.queue.1.recv_timeout(Duration::from_millis(120)) {
                Ok(burst) => {
                    // The lifecycle timers do not apply to the shared access
                    // channel; the accepting flag alone gates decoding.
                    if self.core.lock_state().active {
                        self.process_burst(&burst);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if self.stopping() {
                break;
            }
        }
        tracing::debug!("{}: service thread down", self.core.type_and_offset());
    }

    fn stopping(&self) -> bool {
        !self.core.lock_state().running
    }
}

impl BurstSink for RachDecoder {
    fn write_low_side(&self, burst: &RxBurst) {
        // Never block the radio's receive thread; shed load instead
        if self.queue.0.try_send(burst.clone()).is_err() {
            tracing::warn!("{}: queue full, dropping access burst", self.core.type_and_offset());
        }
    }
}

impl DecoderHalf for RachDecoder {
    fn open(&self) {
        self.core.open();
        // RACH has no assignment or release lifecycle of its own
        let mut st = self.core.lock_state();
        st.t3101.reset();
        st.t3109.reset();
    }

    fn close(&self) {
        self.core.close();
        let mut st = self.core.lock_state();
        st.t3111.reset();
    }

    fn active(&self) -> bool {
        self.core.lock_state().active
    }

    fn recyclable(&self) -> bool {
        false
    }

    fn set_upstream(&self, mux: Arc<dyn SapMux>) {
        self.core.set_upstream(mux);
    }

    fn start(&self) {
        let mut thread = self.thread.lock().expect("thread handle lock poisoned");
        if thread.is_some() {
            return;
        }
        let this = self.self_weak.upgrade().expect("decoder dropped before start");
        *thread = Some(std::thread::spawn(move || this.service_loop()));
    }

    fn stop(&self) {
        {
            let mut st = self.core.lock_state();
            st.running = false;
        }
        if let Some(handle) = self.thread.lock().expect("thread handle lock poisoned").take() {
            let _ = handle.join();
        }
    }
}
