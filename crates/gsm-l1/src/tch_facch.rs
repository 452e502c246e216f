//! TCH/F with its FACCH: 20 ms speech frames multiplexed with in-band
//! signalling by stealing, GSM 05.03 3.1 and 4.2.
//!
//! Coded blocks start every 4 bursts but spread diagonally over 8, so the
//! encoder alternates a block offset between 0 and 4 and the decoder
//! finishes a block on burst 3 (offset 4) or burst 7 (offset 0).

use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use gsm_core::bits::{lsb8msb, pack_bits, peek_field, unpack_bytes};
use gsm_core::burst::{BURST_DATA1, BURST_DATA2};
use gsm_core::{GsmTime, RxBurst, TxBurst};
use gsm_saps::{ArfcnRadio, BurstSink, FramePrimitive, L2Frame, SapMux, VocoderFrame};

use crate::components::convenc::ConvEncState;
use crate::components::interleaver::{tch_deinterleave, tch_interleave, BURST_PAYLOAD_BITS};
use crate::components::parity::{
    ParityBlockCoder, TCH_CODEWORD_BITS, TCH_GENERATOR, TCH_PARITY_BITS, XCCH_CODEWORD_BITS,
    XCCH_GENERATOR, XCCH_PARITY_BITS,
};
use crate::components::tables::{tch_filler_block, GSM610_BIT_ORDER};
use crate::components::viterbi::{decode_soft, GsmViterbiDecoder};
use crate::decoder::DecoderCore;
use crate::encoder::EncoderCore;
use crate::gsmtap::{tap, TapMeta, TAP_BURST_NORMAL};
use crate::l1fec::{DecoderHalf, EncoderHalf, L1Context};
use crate::xcch::{XCCH_CODED_BITS, XCCH_DATA_BITS, XCCH_UNCODED_BITS};

pub const TCH_UNCODED_BITS: usize = 189;
pub const TCH_DATA_BITS: usize = 260;
/// Class-1 coded bits occupy c[0..378); class 2 is copied verbatim after.
pub const TCH_CLASS1_CODED_BITS: usize = 378;
pub const TCH_CLASS1A_BITS: usize = 50;

/// Transmit-side working set for the multiplexed channel: the XCCH buffers
/// for FACCH, the TCH buffers for speech, and the 8-row interleaver they
/// share.
struct TchTx {
    u: [u8; XCCH_UNCODED_BITS],
    c: [u8; XCCH_CODED_BITS],
    i: [[u8; BURST_PAYLOAD_BITS]; 8],
    tchu: [u8; TCH_UNCODED_BITS],
    tchd: [u8; TCH_DATA_BITS],
    filler_c: [u8; XCCH_CODED_BITS],
    burst: TxBurst,
    facch_coder: ParityBlockCoder,
    tch_coder: ParityBlockCoder,
    venc: ConvEncState,
    /// Stealing flag of the previous 4-burst slot
    previous_facch: bool,
    /// Diagonal block offset, alternating 0 and 4
    offset: usize,
}

impl TchTx {
    fn new(tsc: u8) -> TchTx {
        let mut burst = TxBurst::new();
        burst.set_training(tsc);
        TchTx {
            u: [0; XCCH_UNCODED_BITS],
            c: [0; XCCH_CODED_BITS],
            i: [[0; BURST_PAYLOAD_BITS]; 8],
            tchu: [0; TCH_UNCODED_BITS],
            tchd: [0; TCH_DATA_BITS],
            filler_c: tch_filler_block(),
            burst,
            facch_coder: ParityBlockCoder::new(XCCH_GENERATOR, XCCH_PARITY_BITS, XCCH_CODEWORD_BITS),
            tch_coder: ParityBlockCoder::new(TCH_GENERATOR, TCH_PARITY_BITS, TCH_CODEWORD_BITS),
            venc: ConvEncState::new(),
            previous_facch: false,
            offset: 0,
        }
    }

    /// FACCH steals the block: encode the L2 frame as XCCH into c[],
    /// GSM 05.03 4.1.1-4.1.3.
    fn encode_facch(&mut self, data: &[u8]) {
        let payload = unpack_bytes(data);
        assert_eq!(payload.len(), XCCH_DATA_BITS, "FACCH frame must fill d[]");
        self.u[0..XCCH_DATA_BITS].copy_from_slice(&payload);
        lsb8msb(&mut self.u[0..XCCH_DATA_BITS]);
        let (d, pu) = self.u.split_at_mut(XCCH_DATA_BITS);
        self.facch_coder.write_parity_word(d, &mut pu[0..XCCH_PARITY_BITS]);
        self.venc.reset();
        self.venc.encode(&self.u, &mut self.c);
    }

    /// Encode a speech frame into c[], GSM 05.03 3.1.2.
    fn encode_tch(&mut self, frame: &VocoderFrame) {
        // Reorder the 260 bits by importance, GSM 05.03 3.1 and Table 2
        let mut payload = [0u8; TCH_DATA_BITS];
        frame.payload_to(&mut payload);
        for (k, &src) in GSM610_BIT_ORDER.iter().enumerate() {
            self.tchd[k] = payload[src];
        }

        // 3.1.2.1: class-1A parity into u[91..94)
        self.tch_coder
            .write_parity_word(&self.tchd[0..TCH_CLASS1A_BITS], &mut self.tchu[91..94]);

        // 3.1.2.1: fold class 1 d[] into u[]
        for k in 0..=90 {
            self.tchu[k] = self.tchd[2 * k];
            self.tchu[184 - k] = self.tchd[2 * k + 1];
        }

        // 3.1.2.1: tail bits
        for k in 185..TCH_UNCODED_BITS {
            self.tchu[k] = 0;
        }

        // 3.1.2.2: convolutional-encode class 1, copy class 2 verbatim
        self.venc.reset();
        self.venc.encode(&self.tchu, &mut self.c[0..TCH_CLASS1_CODED_BITS]);
        self.c[TCH_CLASS1_CODED_BITS..].copy_from_slice(&self.tchd[182..TCH_DATA_BITS]);
    }

    /// Map interleaver row `b` onto a burst with the given stealing flags.
    fn burst_for_row(&mut self, b: usize, time: GsmTime, hu: bool, hl: bool) -> TxBurst {
        let row = self.i[b];
        self.burst.copy_to_segment(&row[0..57], BURST_DATA1);
        self.burst.copy_to_segment(&row[57..114], BURST_DATA2);
        self.burst.set_hu(hu);
        self.burst.set_hl(hl);
        self.burst.set_time(time);
        self.burst.clone()
    }
}

/// TCH/FACCH encoder. Owns a service thread which composes one 4-burst slot
/// per dispatch, by priority: FACCH, then speech, then the filler block.
pub struct TchFacchEncoder {
    core: EncoderCore,
    tx: Mutex<TchTx>,
    facch_q: (Sender<L2Frame>, Receiver<L2Frame>),
    speech_q: (Sender<VocoderFrame>, Receiver<VocoderFrame>),
    thread: Mutex<Option<JoinHandle<()>>>,
    self_weak: Weak<TchFacchEncoder>,
}

impl TchFacchEncoder {
    pub fn new(ctx: L1Context, tn: u8) -> Arc<TchFacchEncoder> {
        let tsc = ctx.bcc();
        let mapping = gsm_core::tdma_mapping::tchf_mapping(true);
        Arc::new_cyclic(|weak| TchFacchEncoder {
            core: EncoderCore::new(ctx, tn, mapping, TxBurst::dummy()),
            tx: Mutex::new(TchTx::new(tsc)),
            facch_q: unbounded(),
            speech_q: unbounded(),
            thread: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }

    /// Queue a downlink vocoder frame for the next free slot.
    pub fn send_speech_frame(&self, frame: VocoderFrame) {
        let _ = self.speech_q.0.send(frame);
    }

    pub fn speech_queue_len(&self) -> usize {
        self.speech_q.1.len()
    }

    /// Compose and transmit one 4-burst slot. Public so tests can drive the
    /// multiplexing without the service thread.
    pub fn dispatch(&self) {
        let cancel = self.core.cancel_token();
        let Some(radio) = self.core.radio().cloned() else {
            // No radio yet; don't spin
            cancel.wait_timeout(Duration::from_millis(120));
            return;
        };

        // Get right with the system clock
        {
            let mut s = self.core.lock_sched();
            self.core.resync_locked(&mut s);
        }

        // An inactive channel cannot just park: the interleaver must be fed
        // on time once it reopens. Sleep a multiframe and check again.
        if !self.active() {
            let t = {
                let mut s = self.core.lock_sched();
                s.next_write_time = s.next_write_time.add_frames(26);
                s.next_write_time
            };
            self.core.ctx().clock.wait_until(t, cancel);
            return;
        }

        // Let previous data get transmitted
        {
            let mut s = self.core.lock_sched();
            self.core.resync_locked(&mut s);
        }
        self.core.wait_to_send();

        // Speech latency control: drop the oldest queued frames
        let max_q = self.core.ctx().config.config().radioctl.max_speech_latency;
        while self.speech_q.1.len() > max_q {
            let _ = self.speech_q.1.try_recv();
        }

        let mut current_facch = false;
        let next = {
            let mut guard = self.tx.lock().expect("encoder fec lock poisoned");
            let tx = &mut *guard;

            // Send, by priority: (1) FACCH, (2) TCH, (3) filler
            if let Ok(frame) = self.facch_q.1.try_recv() {
                tracing::debug!("{}: FACCH steals slot: {:?}", self.core.type_and_offset(), frame);
                current_facch = true;
                tx.encode_facch(frame.data());
                // Flush the vocoder FIFO to limit latency
                while self.speech_q.1.try_recv().is_ok() {}
            } else if let Ok(frame) = self.speech_q.1.try_recv() {
                tracing::trace!("{}: speech frame", self.core.type_and_offset());
                tx.encode_tch(&frame);
            } else {
                // We have no ready data but must send SOMETHING
                tx.c = tx.filler_c;
            }

            let offset = tx.offset;
            tch_interleave(&tx.c, &mut tx.i, offset);

            tap(
                &self.core.ctx().tap,
                TapMeta {
                    arfcn: radio.arfcn(),
                    tn: self.core.tn(),
                    frame: self.core.lock_sched().next_write_time.f,
                    chan: self.core.type_and_offset(),
                    uplink: false,
                    subtype: TAP_BURST_NORMAL,
                },
                &tx.c,
            );

            // Map onto bursts with the stealing flags, GSM 05.03 3.1.4
            let previous_facch = tx.previous_facch;
            let mut next = GsmTime::default();
            for b in 0..4 {
                let time = {
                    let s = self.core.lock_sched();
                    s.next_write_time
                };
                let burst = tx.burst_for_row(b + offset, time, current_facch, previous_facch);
                radio.write_high_side(burst);
                let mut s = self.core.lock_sched();
                self.core.roll_forward_locked(&mut s);
                next = s.next_write_time;
            }

            // Update the diagonal phase and the stealing history
            tx.offset = if offset == 0 { 4 } else { 0 };
            tx.previous_facch = current_facch;
            next
        };
        self.core.signal_next_wtime(next);
    }

    fn service_loop(&self) {
        tracing::debug!("{}: service thread up", self.core.type_and_offset());
        while !self.core.cancel_token().cancelled() {
            self.dispatch();
        }
        tracing::debug!("{}: service thread down", self.core.type_and_offset());
    }
}

impl EncoderHalf for TchFacchEncoder {
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
            FramePrimitive::Data => {
                // Queued; the service thread steals the next slot for it
                let _ = self.facch_q.0.send(frame);
            }
            FramePrimitive::Establish => {
                self.open();
                if let Some(sib) = self.core.sibling() {
                    sib.open();
                }
            }
            FramePrimitive::Release => {
                self.close();
                if let Some(sib) = self.core.sibling() {
                    sib.close();
                }
            }
            FramePrimitive::Error => {
                self.close();
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

/// Receive-side working set.
struct TchRx {
    i: [[f32; BURST_PAYLOAD_BITS]; 8],
    c: [f32; XCCH_CODED_BITS],
    u: [u8; XCCH_UNCODED_BITS],
    tchu: [u8; TCH_UNCODED_BITS],
    tchd: [u8; TCH_DATA_BITS],
    /// Previous good frame, kept packed for GSM 06.11 masking
    prev_good_frame: [u8; 33],
    facch_coder: ParityBlockCoder,
    tch_coder: ParityBlockCoder,
    vdec: GsmViterbiDecoder,
    rng: StdRng,
}

impl TchRx {
    fn new(tn: u8) -> TchRx {
        TchRx {
            i: [[0.5; BURST_PAYLOAD_BITS]; 8],
            c: [0.5; XCCH_CODED_BITS],
            u: [0; XCCH_UNCODED_BITS],
            tchu: [0; TCH_UNCODED_BITS],
            tchd: [0; TCH_DATA_BITS],
            prev_good_frame: *VocoderFrame::new().as_bytes(),
            facch_coder: ParityBlockCoder::new(XCCH_GENERATOR, XCCH_PARITY_BITS, XCCH_CODEWORD_BITS),
            tch_coder: ParityBlockCoder::new(TCH_GENERATOR, TCH_PARITY_BITS, TCH_CODEWORD_BITS),
            vdec: GsmViterbiDecoder::new(),
            // Per-channel seed keeps the concealment deterministic in tests
            rng: StdRng::seed_from_u64(0x0610_0000 + tn as u64),
        }
    }

    /// Decode the assembled block as a stolen FACCH frame.
    fn decode_facch(&mut self) -> bool {
        decode_soft(&self.vdec, &self.c, &mut self.u);
        for p in self.u[XCCH_DATA_BITS..XCCH_DATA_BITS + XCCH_PARITY_BITS].iter_mut() {
            *p ^= 1;
        }
        self.facch_coder.syndrome(&self.u[0..XCCH_DATA_BITS + XCCH_PARITY_BITS]) == 0
    }

    /// Decode the assembled block as speech, GSM 05.03 3.1.2 backwards.
    /// Returns (good, frame to forward).
    fn decode_tch(&mut self, stolen: bool) -> (bool, VocoderFrame) {
        // If the frame wasn't stolen, parity decides below
        let mut good = !stolen;

        if !stolen {
            // 3.1.2.2: class 1 from c[] to u[], class 2 copied sliced
            decode_soft(&self.vdec, &self.c[0..TCH_CLASS1_CODED_BITS], &mut self.tchu);
            for k in 0..78 {
                self.tchd[182 + k] = (self.c[TCH_CLASS1_CODED_BITS + k] > 0.5) as u8;
            }

            // 3.1.2.1: unfold class 1 u[] to d[]
            for k in 0..=90 {
                self.tchd[2 * k] = self.tchu[k];
                self.tchd[2 * k + 1] = self.tchu[184 - k];
            }

            // 3.1.2.1: check class-1A parity; 3.1.2.2: and the tail bits
            let sent_parity = (!peek_field(&self.tchu, 91, 3)) & 0x7;
            let calc_parity = self.tch_coder.parity(&self.tchd[0..TCH_CLASS1A_BITS]) & 0x7;
            let tail = peek_field(&self.tchu, 185, 4);
            good = sent_parity == calc_parity && tail == 0;

            if good {
                // Undo the importance-sorted bit ordering
                let mut payload = [0u8; TCH_DATA_BITS];
                for (k, &dst) in GSM610_BIT_ORDER.iter().enumerate() {
                    payload[dst] = self.tchd[k];
                }
                let frame = VocoderFrame::from_payload_bits(&payload);
                self.prev_good_frame = *frame.as_bytes();
            }
        }

        if !good {
            // Bad frame processing, GSM 06.11: attenuate block amplitudes
            // and randomize grid positions in the last good frame.
            let raw_byte = self.prev_good_frame[27];
            let xmaxc = (raw_byte & 0x1f).saturating_sub(2);
            for i in 0..4 {
                let pos: u8 = self.rng.random_range(0..4);
                self.prev_good_frame[6 + 7 * i] = (raw_byte & 0x80) | pos | xmaxc;
                self.prev_good_frame[7 + 7 * i] &= 0x7f;
            }
        }

        (good, VocoderFrame::from_bytes(self.prev_good_frame))
    }
}

/// TCH/FACCH decoder: 8-burst diagonal deinterleave, stolen-block FACCH
/// decode, speech decode with bad-frame concealment.
pub struct TchFacchDecoder {
    core: DecoderCore,
    rx: Mutex<TchRx>,
}

impl TchFacchDecoder {
    pub fn new(ctx: L1Context, tn: u8) -> Arc<TchFacchDecoder> {
        let mapping = gsm_core::tdma_mapping::tchf_mapping(false);
        let core = DecoderCore::new(ctx, tn, mapping);
        Arc::new(TchFacchDecoder { core, rx: Mutex::new(TchRx::new(tn)) })
    }

    /// True once the link-loss timer has run out.
    pub fn uplink_lost(&self) -> bool {
        self.core.lock_state().t3109.expired()
    }

    fn process_burst(&self, burst: &RxBurst) {
        // The reverse index runs 0..7; the "B" of GSM 05.03 3.1.3/3.1.4
        let b = self.core.burst_index(burst.time(), 8);
        {
            let mut st = self.core.lock_state();
            self.core.process_phy_locked(&mut st, burst);
            if b % 4 == 0 {
                st.read_time = burst.time();
            }
        }

        // Was this the end of a stolen frame? GSM 05.03 4.2.5
        let stolen = burst.hl();

        let (facch_result, tch_result) = {
            let mut rx = self.rx.lock().expect("decoder fec lock poisoned");
            rx.i[b][0..57].copy_from_slice(burst.data1());
            rx.i[b][57..114].copy_from_slice(burst.data2());

            // Every 4th burst completes a block
            if b % 4 != 3 {
                return;
            }

            // Deinterleave by the diagonal phase of B, GSM 05.03 3.1.3
            let offset = if b == 3 { 4 } else { 0 };
            let rxm = &mut *rx;
            tch_deinterleave(&mut rxm.i, &mut rxm.c, offset);

            let facch_result = if stolen { Some(rx.decode_facch()) } else { None };
            // Always feed the traffic channel, even on a stolen frame;
            // decode_tch runs the GSM 06.11 bad-frame processing.
            let tch_result = rx.decode_tch(stolen);
            (facch_result, tch_result)
        };

        match facch_result {
            Some(true) => {
                tracing::debug!("{}: good FACCH frame", self.core.type_and_offset());
                self.handle_good_facch();
            }
            Some(false) => {
                tracing::debug!("{}: bad FACCH frame", self.core.type_and_offset());
                let mut st = self.core.lock_state();
                self.core.count_bad_frame_locked(&mut st);
            }
            None => {}
        }

        let (good, frame) = tch_result;
        let (when, rssi, ta, fer) = {
            let mut st = self.core.lock_state();
            if good {
                // Don't let the channel time out
                self.core.count_good_frame_locked(&mut st);
            } else {
                self.core.count_bad_frame_locked(&mut st);
            }
            (st.read_time, DecoderCore::rssi_locked(&mut st), DecoderCore::ta_locked(&mut st), st.fer)
        };

        // Only feed the speech path if this block was TCH, not FACCH
        if !stolen {
            let Some(mux) = self.core.upstream() else {
                tracing::warn!("{}: no upstream connected, dropping frame", self.core.type_and_offset());
                return;
            };
            mux.write_low_side_tch(frame, when, rssi, ta, fer);
        }
    }

    fn handle_good_facch(&self) {
        let (when, rssi, ta, fer) = {
            let mut st = self.core.lock_state();
            self.core.count_good_frame_locked(&mut st);
            (st.read_time, DecoderCore::rssi_locked(&mut st), DecoderCore::ta_locked(&mut st), st.fer)
        };

        let payload = {
            let mut rx = self.rx.lock().expect("decoder fec lock poisoned");
            lsb8msb(&mut rx.u[0..XCCH_DATA_BITS]);
            let payload = pack_bits(&rx.u[0..XCCH_DATA_BITS]);
            tap(
                &self.core.ctx().tap,
                TapMeta {
                    arfcn: 0,
                    tn: self.core.tn(),
                    frame: when.f,
                    chan: self.core.type_and_offset(),
                    uplink: true,
                    subtype: TAP_BURST_NORMAL,
                },
                &rx.u,
            );
            payload
        };

        let Some(mux) = self.core.upstream() else {
            tracing::warn!("{}: no upstream connected, dropping frame", self.core.type_and_offset());
            return;
        };
        mux.write_low_side(L2Frame::new(FramePrimitive::Data, payload), when, rssi, ta, fer);
    }
}

impl BurstSink for TchFacchDecoder {
    fn write_low_side(&self, burst: &RxBurst) {
        if !self.core.active() {
            tracing::trace!("{}: not active, ignoring input", self.core.type_and_offset());
            return;
        }
        self.process_burst(burst);
    }
}

impl DecoderHalf for TchFacchDecoder {
    fn open(&self) {
        self.core.open();
    }

    fn close(&self) {
        self.core.close();
    }

    fn active(&self) -> bool {
        self.core.active()
    }

    fn recyclable(&self) -> bool {
        self.core.recyclable()
    }

    fn set_upstream(&self, mux: Arc<dyn SapMux>) {
        self.core.set_upstream(mux);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tch_code_roundtrip() {
        let mut tx = TchTx::new(0);
        let mut rx = TchRx::new(0);

        let bits: Vec<u8> = (0..260).map(|i| ((i * 7 + 3) % 4 < 2) as u8).collect();
        let frame = VocoderFrame::from_payload_bits(&bits);
        tx.encode_tch(&frame);

        for k in 0..XCCH_CODED_BITS {
            rx.c[k] = tx.c[k] as f32;
        }
        let (good, decoded) = rx.decode_tch(false);
        assert!(good);
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_tch_bad_frame_masking() {
        let mut tx = TchTx::new(0);
        let mut rx = TchRx::new(0);

        let bits: Vec<u8> = (0..260).map(|i| (i % 3 == 0) as u8).collect();
        let good_frame = VocoderFrame::from_payload_bits(&bits);

        // Prime the previous-good-frame buffer
        tx.encode_tch(&good_frame);
        for k in 0..XCCH_CODED_BITS {
            rx.c[k] = tx.c[k] as f32;
        }
        let (good, _) = rx.decode_tch(false);
        assert!(good);

        // An all-erased class 1 decodes to the zero word, whose inverted
        // parity cannot match: the frame must be flagged bad
        for k in 0..TCH_CLASS1_CODED_BITS {
            rx.c[k] = 0.5;
        }
        let (good, masked) = rx.decode_tch(false);
        assert!(!good);
        // Concealment forwarded a mutation of the previous good frame
        assert_eq!(masked.as_bytes()[0] >> 4, 0xd);
        for i in 0..4 {
            // Grid bytes lost their top bit, amplitude attenuated in place
            assert_eq!(masked.as_bytes()[7 + 7 * i] & 0x80, 0);
        }
    }

    #[test]
    fn test_stolen_block_masks_but_counts_no_speech() {
        let mut tx = TchTx::new(1);
        let mut rx = TchRx::new(1);

        let bits: Vec<u8> = (0..260).map(|i| ((i + 1) % 4 == 0) as u8).collect();
        let frame = VocoderFrame::from_payload_bits(&bits);
        tx.encode_tch(&frame);
        for k in 0..XCCH_CODED_BITS {
            rx.c[k] = tx.c[k] as f32;
        }
        assert!(rx.decode_tch(false).0);

        // A stolen block is never a good speech frame
        let (good, _) = rx.decode_tch(true);
        assert!(!good);
    }

    #[test]
    fn test_facch_code_roundtrip() {
        let mut tx = TchTx::new(3);
        let mut rx = TchRx::new(3);

        let l2: Vec<u8> = (0..23).map(|i| (i as u8).wrapping_mul(37).wrapping_add(5)).collect();
        tx.encode_facch(&l2);
        for k in 0..XCCH_CODED_BITS {
            rx.c[k] = tx.c[k] as f32;
        }
        assert!(rx.decode_facch());
        lsb8msb(&mut rx.u[0..XCCH_DATA_BITS]);
        assert_eq!(pack_bits(&rx.u[0..XCCH_DATA_BITS]), l2);
    }
}
