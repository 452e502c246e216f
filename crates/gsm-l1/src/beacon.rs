//! Downlink beacon generators: FCCH and SCH.
//!
//! Both are periodic and take no upper-layer input; a service thread per
//! encoder paces itself with resync/wait_to_send and emits a burst at every
//! scheduled slot.

use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use gsm_core::bits::{fill_field, lsb8msb, unpack_bytes};
use gsm_core::burst::{SCH_DATA1, SCH_DATA2, SCH_TRAINING, SCH_TRAINING_SEQUENCE};
use gsm_core::tdma_mapping::{FCCH_MAPPING, SCH_MAPPING};
use gsm_core::{GsmTime, TxBurst};
use gsm_saps::{ArfcnRadio, FramePrimitive, L2Frame, SapMux};

use crate::components::convenc::ConvEncState;
use crate::components::parity::{
    ParityBlockCoder, SCH_CODEWORD_BITS, SCH_GENERATOR, SCH_PARITY_BITS,
};
use crate::encoder::EncoderCore;
use crate::gsmtap::{tap, TapMeta, TAP_BURST_FCCH, TAP_BURST_SCH};
use crate::l1fec::{DecoderHalf, EncoderHalf, L1Context};

const SCH_DATA_BITS: usize = 25;
const SCH_UNCODED_BITS: usize = 39;
const SCH_CODED_BITS: usize = 78;

/// Pack the synchronization channel information of GSM 04.08 9.1.30:
/// BSIC, then the reduced frame number T1/T2/T3'.
pub fn sch_payload(bsic: u8, frame: u32) -> [u8; 4] {
    let t1 = frame / (26 * 51);
    let t2 = frame % 26;
    let t3 = frame % 51;
    let t3p = (t3.max(1) - 1) / 10;

    let mut bits = [0u8; 32];
    fill_field(&mut bits, 0, 6, bsic as u64);
    fill_field(&mut bits, 6, 11, t1 as u64);
    fill_field(&mut bits, 17, 5, t2 as u64);
    fill_field(&mut bits, 22, 3, t3p as u64);
    let packed = gsm_core::bits::pack_bits(&bits);
    [packed[0], packed[1], packed[2], packed[3]]
}

struct SchTx {
    u: [u8; SCH_UNCODED_BITS],
    e: [u8; SCH_CODED_BITS],
    burst: TxBurst,
    coder: ParityBlockCoder,
    venc: ConvEncState,
}

impl SchTx {
    /// Run the SCH pipeline of GSM 05.03 4.7 and stamp the burst.
    fn encode(&mut self, payload: &[u8; 4], time: GsmTime) {
        let mut d = unpack_bytes(payload);
        lsb8msb(&mut d);
        self.u[0..SCH_DATA_BITS].copy_from_slice(&d[0..SCH_DATA_BITS]);

        let (data, pu) = self.u.split_at_mut(SCH_DATA_BITS);
        self.coder.write_parity_word(data, &mut pu[0..SCH_PARITY_BITS]);
        // Tail u[35..39) stays zero

        self.venc.reset();
        self.venc.encode(&self.u, &mut self.e);

        // Two 39-bit halves around the extended training sequence
        self.burst.copy_to_segment(&self.e[0..39], SCH_DATA1);
        self.burst.copy_to_segment(&self.e[39..78], SCH_DATA2);
        self.burst.set_time(time);
    }
}

/// SCH: synchronization bursts carrying the BSIC and the reduced frame
/// number, GSM 05.03 4.7.
pub struct SchEncoder {
    core: EncoderCore,
    tx: Mutex<SchTx>,
    thread: Mutex<Option<JoinHandle<()>>>,
    self_weak: Weak<SchEncoder>,
}

impl SchEncoder {
    pub fn new(ctx: L1Context) -> Arc<SchEncoder> {
        let mut burst = TxBurst::new();
        burst.copy_to_segment(&SCH_TRAINING_SEQUENCE, SCH_TRAINING);
        Arc::new_cyclic(|weak| SchEncoder {
            core: EncoderCore::new(ctx, 0, SCH_MAPPING, TxBurst::dummy()),
            tx: Mutex::new(SchTx {
                u: [0; SCH_UNCODED_BITS],
                e: [0; SCH_CODED_BITS],
                burst,
                coder: ParityBlockCoder::new(SCH_GENERATOR, SCH_PARITY_BITS, SCH_CODEWORD_BITS),
                venc: ConvEncState::new(),
            }),
            thread: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }

    /// Build and transmit the burst for the upcoming scheduled slot.
    pub fn generate(&self) {
        let Some(radio) = self.core.radio().cloned() else {
            self.core.cancel_token().wait_timeout(Duration::from_millis(120));
            return;
        };

        let (time, next) = {
            let mut tx = self.tx.lock().expect("encoder fec lock poisoned");
            let time = self.core.lock_sched().next_write_time;

            let payload = sch_payload(self.core.ctx().bsic(), time.f);
            tx.encode(&payload, time);

            tap(
                &self.core.ctx().tap,
                TapMeta {
                    arfcn: radio.arfcn(),
                    tn: 0,
                    frame: time.f,
                    chan: self.core.type_and_offset(),
                    uplink: false,
                    subtype: TAP_BURST_SCH,
                },
                &tx.u,
            );

            radio.write_high_side(tx.burst.clone());
            let mut s = self.core.lock_sched();
            self.core.roll_forward_locked(&mut s);
            (time, s.next_write_time)
        };
        tracing::trace!("{}: sync burst at {}", self.core.type_and_offset(), time);
        self.core.signal_next_wtime(next);
    }

    fn service_loop(&self) {
        let cancel = self.core.cancel_token();
        while !cancel.cancelled() {
            if !self.core.active() {
                cancel.wait_timeout(Duration::from_millis(120));
                continue;
            }
            {
                let mut s = self.core.lock_sched();
                self.core.resync_locked(&mut s);
            }
            self.core.wait_to_send();
            self.generate();
        }
    }
}

impl EncoderHalf for SchEncoder {
    fn open(&self) {
        self.core.open();
    }

    fn close(&self) {
        self.core.close();
    }

    fn active(&self) -> bool {
        self.core.active()
    }

    fn write_high_side(&self, frame: L2Frame) {
        // The generator builds its own payload; only lifecycle primitives
        // make sense here.
        match frame.primitive() {
            FramePrimitive::Establish => self.open(),
            FramePrimitive::Release | FramePrimitive::Error => self.close(),
            FramePrimitive::Data => {
                tracing::warn!("{}: DATA has no meaning on a beacon generator", self.core.type_and_offset());
            }
        }
    }

    fn set_downstream(&self, radio: Arc<dyn ArfcnRadio>) {
        self.core.set_downstream(radio);
    }

    fn set_upstream(&self, mux: Arc<dyn SapMux>) {
        self.core.set_upstream(mux);
    }

    fn set_sibling(&self, sibling: Weak<dyn DecoderHalf>) {
        self.core.set_sibling(sibling);
    }

    fn type_and_offset(&self) -> gsm_core::TypeAndOffset {
        self.core.type_and_offset()
    }

    fn start(&self) {
        let mut thread = self.thread.lock().expect("thread handle lock poisoned");
        if thread.is_some() {
            return;
        }
        let this = self.self_weak.upgrade().expect("encoder dropped before start");
        *thread = Some(std::thread::spawn(move || this.service_loop()));
    }

    fn stop(&self) {
        self.core.cancel_token().cancel();
        if let Some(handle) = self.thread.lock().expect("thread handle lock poisoned").take() {
            let _ = handle.join();
        }
    }
}

/// FCCH: the frequency-correction burst is all zeros; emitting it at every
/// scheduled slot is the entire job. Kept distinct from XCCH on purpose.
pub struct FcchEncoder {
    core: EncoderCore,
    thread: Mutex<Option<JoinHandle<()>>>,
    self_weak: Weak<FcchEncoder>,
}

impl FcchEncoder {
    pub fn new(ctx: L1Context) -> Arc<FcchEncoder> {
        Arc::new_cyclic(|weak| FcchEncoder {
            // The idle fill on the beacon slot is also the zero burst
            core: EncoderCore::new(ctx, 0, FCCH_MAPPING, TxBurst::new()),
            thread: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }

    pub fn generate(&self) {
        let Some(radio) = self.core.radio().cloned() else {
            self.core.cancel_token().wait_timeout(Duration::from_millis(120));
            return;
        };

        let (time, next) = {
            let mut s = self.core.lock_sched();
            let time = s.next_write_time;
            let mut burst = TxBurst::new();
            burst.set_time(time);
            radio.write_high_side(burst);
            self.core.roll_forward_locked(&mut s);
            (time, s.next_write_time)
        };
        tracing::trace!("{}: frequency burst at {}", self.core.type_and_offset(), time);

        tap(
            &self.core.ctx().tap,
            TapMeta {
                arfcn: radio.arfcn(),
                tn: 0,
                frame: time.f,
                chan: self.core.type_and_offset(),
                uplink: false,
                subtype: TAP_BURST_FCCH,
            },
            &[],
        );
        self.core.signal_next_wtime(next);
    }

    fn service_loop(&self) {
        let cancel = self.core.cancel_token();
        while !cancel.cancelled() {
            if !self.core.active() {
                cancel.wait_timeout(Duration::from_millis(120));
                continue;
            }
            {
                let mut s = self.core.lock_sched();
                self.core.resync_locked(&mut s);
            }
            self.core.wait_to_send();
            self.generate();
        }
    }
}

impl EncoderHalf for FcchEncoder {
    fn open(&self) {
        self.core.open();
    }

    fn close(&self) {
        self.core.close();
    }

    fn active(&self) -> bool {
        self.core.active()
    }

    fn write_high_side(&self, frame: L2Frame) {
        match frame.primitive() {
            FramePrimitive::Establish => self.open(),
            FramePrimitive::Release | FramePrimitive::Error => self.close(),
            FramePrimitive::Data => {
                tracing::warn!("{}: DATA has no meaning on a beacon generator", self.core.type_and_offset());
            }
        }
    }

    fn set_downstream(&self, radio: Arc<dyn ArfcnRadio>) {
        self.core.set_downstream(radio);
    }

    fn set_upstream(&self, mux: Arc<dyn SapMux>) {
        self.core.set_upstream(mux);
    }

    fn set_sibling(&self, sibling: Weak<dyn DecoderHalf>) {
        self.core.set_sibling(sibling);
    }

    fn type_and_offset(&self) -> gsm_core::TypeAndOffset {
        self.core.type_and_offset()
    }

    fn start(&self) {
        let mut thread = self.thread.lock().expect("thread handle lock poisoned");
        if thread.is_some() {
            return;
        }
        let this = self.self_weak.upgrade().expect("encoder dropped before start");
        *thread = Some(std::thread::spawn(move || this.service_loop()));
    }

    fn stop(&self) {
        self.core.cancel_token().cancel();
        if let Some(handle) = self.thread.lock().expect("thread handle lock poisoned").take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sch_payload_fields() {
        use gsm_core::bits::{peek_field, unpack_bytes};
        // Frame 21 of superframe 3: T1=3? No: T1 = fn / 1326
        let frame = 3 * 1326 + 21;
        let payload = sch_payload(0x2a, frame);
        let bits = unpack_bytes(&payload);
        assert_eq!(peek_field(&bits, 0, 6), 0x2a);
        assert_eq!(peek_field(&bits, 6, 11), 3);
        assert_eq!(peek_field(&bits, 17, 5), (frame % 26) as u64);
        // T3 = 21 -> T3' = 2
        assert_eq!(peek_field(&bits, 22, 3), 2);
        // Padding bits are zero
        assert_eq!(peek_field(&bits, 25, 7), 0);
    }
}
