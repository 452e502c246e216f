//! The XCCH FEC pipeline of GSM 05.03 4.1: the common control-channel format
//! behind SDCCH, BCCH, CCCH, SACCH and FACCH.
//!
//! Encoding: L2 frame -> d -> parity -> u -> convolutional -> c ->
//! 4-burst interleave -> bursts. Decoding mirrors it.

use std::sync::{Arc, Mutex, Weak};

use gsm_core::bits::{fill_field, lsb8msb, pack_bits, unpack_bytes};
use gsm_core::burst::{BURST_DATA1, BURST_DATA2};
use gsm_core::{GsmTime, RxBurst, TdmaMapping, TxBurst};
use gsm_saps::{ArfcnRadio, BurstSink, FramePrimitive, L2Frame, SapMux};

use crate::components::convenc::ConvEncState;
use crate::components::interleaver::{xcch_deinterleave, xcch_interleave, BURST_PAYLOAD_BITS};
use crate::components::parity::{
    ParityBlockCoder, XCCH_CODEWORD_BITS, XCCH_GENERATOR, XCCH_PARITY_BITS,
};
use crate::components::viterbi::{decode_soft, GsmViterbiDecoder};
use crate::decoder::DecoderCore;
use crate::encoder::EncoderCore;
use crate::gsmtap::{tap, TapMeta, TAP_BURST_NORMAL};
use crate::l1fec::{DecoderHalf, EncoderHalf, L1Context};

pub const XCCH_DATA_BITS: usize = 184;
pub const XCCH_UNCODED_BITS: usize = 228;
pub const XCCH_CODED_BITS: usize = 456;

/// Transmit-side working set: u[228], c[456] and the four interleaver rows,
/// plus the burst template with the fields that never change.
pub(crate) struct XcchTx {
    u: [u8; XCCH_UNCODED_BITS],
    c: [u8; XCCH_CODED_BITS],
    i: [[u8; BURST_PAYLOAD_BITS]; 4],
    burst: TxBurst,
    coder: ParityBlockCoder,
    venc: ConvEncState,
}

impl XcchTx {
    pub(crate) fn new(tsc: u8) -> XcchTx {
        let mut burst = TxBurst::new();
        // Stealing bits for a control channel, GSM 05.03 4.2.5, 05.02 5.2.3
        burst.set_hl(true);
        burst.set_hu(true);
        burst.set_training(tsc);

        XcchTx {
            // Zeroed u[] takes care of the tail field at u[224..228)
            u: [0; XCCH_UNCODED_BITS],
            c: [0; XCCH_CODED_BITS],
            i: [[0; BURST_PAYLOAD_BITS]; 4],
            burst,
            coder: ParityBlockCoder::new(XCCH_GENERATOR, XCCH_PARITY_BITS, XCCH_CODEWORD_BITS),
            venc: ConvEncState::new(),
        }
    }

    /// Direct access to u[], for channels that prepend a physical header.
    pub(crate) fn fill_u_field(&mut self, pos: usize, len: usize, value: u64) {
        fill_field(&mut self.u, pos, len, value);
    }

    pub(crate) fn u(&self) -> &[u8; XCCH_UNCODED_BITS] {
        &self.u
    }

    /// Run the FEC pipeline of GSM 05.03 4.1.1-4.1.4 on an L2 payload,
    /// leaving the result in the interleaver rows. Bits of u[] below
    /// `header_offset` must have been written by the caller.
    pub(crate) fn encode_frame(&mut self, data: &[u8], header_offset: usize) {
        let payload = unpack_bytes(data);
        assert_eq!(
            header_offset + payload.len(),
            XCCH_DATA_BITS,
            "L2 frame of {} bits does not fill d[] at offset {}",
            payload.len(),
            header_offset
        );
        self.u[header_offset..XCCH_DATA_BITS].copy_from_slice(&payload);

        // GSM sends each octet of d[] LSB first on the air
        lsb8msb(&mut self.u[0..XCCH_DATA_BITS]);

        // Parity over d[] into p[], GSM 05.03 4.1.2
        let (d, pu) = self.u.split_at_mut(XCCH_DATA_BITS);
        self.coder.write_parity_word(d, &mut pu[0..XCCH_PARITY_BITS]);

        // Convolutional encoder, GSM 05.03 4.1.3
        self.venc.reset();
        self.venc.encode(&self.u, &mut self.c);

        // Interleave c[] to i[][], GSM 05.03 4.1.4
        xcch_interleave(&self.c, &mut self.i);
    }

    /// Map interleaver row `b` onto the burst template and stamp it.
    pub(crate) fn burst_for_row(&mut self, b: usize, time: GsmTime) -> TxBurst {
        let row = self.i[b];
        self.burst.copy_to_segment(&row[0..57], BURST_DATA1);
        self.burst.copy_to_segment(&row[57..114], BURST_DATA2);
        self.burst.set_time(time);
        self.burst.clone()
    }
}

/// Transmit the four bursts of the block held in `tx`, pacing against the
/// clock. Returns the write time after the last burst for upstream
/// scheduling.
pub(crate) fn transmit_block(core: &EncoderCore, tx: &mut XcchTx, radio: &Arc<dyn ArfcnRadio>) -> GsmTime {
    // Don't get too far ahead of the clock
    core.wait_to_send();

    let mut next = GsmTime::default();
    for b in 0..4 {
        let time = {
            let s = core.lock_sched();
            s.next_write_time
        };
        let burst = tx.burst_for_row(b, time);
        tracing::trace!("{}: tx burst {} at {}", core.type_and_offset(), b, time);
        radio.write_high_side(burst);
        let mut s = core.lock_sched();
        core.roll_forward_locked(&mut s);
        next = s.next_write_time;
    }
    next
}

/// XCCH encoder. Data-driven: each DATA primitive becomes one 4-burst block.
pub struct XcchEncoder {
    core: EncoderCore,
    /// 0 for plain control channels, 16 for the SACCH physical header
    header_offset: usize,
    tx: Mutex<XcchTx>,
}

impl XcchEncoder {
    pub fn new(ctx: L1Context, tn: u8, mapping: TdmaMapping, header_offset: usize) -> Arc<XcchEncoder> {
        let tsc = ctx.bcc();
        let core = EncoderCore::new(ctx, tn, mapping, TxBurst::dummy());
        Arc::new(XcchEncoder { core, header_offset, tx: Mutex::new(XcchTx::new(tsc)) })
    }

    fn send_frame(&self, frame: &L2Frame) {
        // Make sure there's something down there to take the bursts
        let Some(radio) = self.core.radio().cloned() else {
            tracing::warn!("{}: no downstream radio, dropping frame", self.core.type_and_offset());
            return;
        };

        let next = {
            let mut tx = self.tx.lock().expect("encoder fec lock poisoned");
            tx.encode_frame(frame.data(), self.header_offset);

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
                tx.u(),
            );

            transmit_block(&self.core, &mut tx, &radio)
        };
        self.core.signal_next_wtime(next);
    }
}

impl EncoderHalf for XcchEncoder {
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
        tracing::debug!("{}: write_high_side {:?}", self.core.type_and_offset(), frame);
        match frame.primitive() {
            FramePrimitive::Data => {
                if !self.active() {
                    tracing::info!("{}: sending on non-active channel", self.core.type_and_offset());
                }
                let mut s = self.core.lock_sched();
                self.core.resync_locked(&mut s);
                drop(s);
                self.send_frame(&frame);
            }
            FramePrimitive::Establish => {
                // Open both sides of the link; the phone is waiting to see
                // the idle pattern.
                self.open();
                if let Some(sib) = self.core.sibling() {
                    sib.open();
                }
            }
            FramePrimitive::Release => {
                // Normally reached after a DISC-DM handshake in L2. Close
                // both sides, knowing the phone will do the same.
                self.close();
                if let Some(sib) = self.core.sibling() {
                    sib.close();
                }
            }
            FramePrimitive::Error => {
                // The link failed in L2 after several ack timeouts. Close
                // the tx side and let the receiver time out on its own, so
                // the channel is not recycled while the phone still
                // transmits.
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
}

/// Receive-side working set.
pub(crate) struct XcchRx {
    i: [[f32; BURST_PAYLOAD_BITS]; 4],
    c: [f32; XCCH_CODED_BITS],
    u: [u8; XCCH_UNCODED_BITS],
    coder: ParityBlockCoder,
    vdec: GsmViterbiDecoder,
}

impl XcchRx {
    pub(crate) fn new() -> XcchRx {
        XcchRx {
            // Erasure-fill so a block with missing bursts degrades cleanly
            i: [[0.5; BURST_PAYLOAD_BITS]; 4],
            c: [0.5; XCCH_CODED_BITS],
            u: [0; XCCH_UNCODED_BITS],
            coder: ParityBlockCoder::new(XCCH_GENERATOR, XCCH_PARITY_BITS, XCCH_CODEWORD_BITS),
            vdec: GsmViterbiDecoder::new(),
        }
    }

    /// Accept the data fields of burst `b` into the deinterleaver.
    pub(crate) fn accept_burst(&mut self, b: usize, burst: &RxBurst) {
        self.i[b][0..57].copy_from_slice(burst.data1());
        self.i[b][57..114].copy_from_slice(burst.data2());
    }

    /// Deinterleave, Viterbi-decode and parity-check the assembled block.
    /// On success u[] holds the uncoded frame with d[] still in air order.
    pub(crate) fn decode(&mut self) -> bool {
        xcch_deinterleave(&mut self.i, &mut self.c);
        decode_soft(&self.vdec, &self.c, &mut self.u);

        // Parity is transmitted inverted
        for p in self.u[XCCH_DATA_BITS..XCCH_DATA_BITS + XCCH_PARITY_BITS].iter_mut() {
            *p ^= 1;
        }
        // The 40-bit parity makes false detections extremely rare
        self.coder.syndrome(&self.u[0..XCCH_DATA_BITS + XCCH_PARITY_BITS]) == 0
    }

    /// Undo the air ordering of d[] and extract the L2 payload.
    pub(crate) fn take_l2(&mut self, header_offset: usize) -> Vec<u8> {
        lsb8msb(&mut self.u[0..XCCH_DATA_BITS]);
        pack_bits(&self.u[header_offset..XCCH_DATA_BITS])
    }

    pub(crate) fn u(&self) -> &[u8; XCCH_UNCODED_BITS] {
        &self.u
    }
}

/// XCCH decoder: accumulates 4 bursts, then Viterbi + parity check.
pub struct XcchDecoder {
    core: DecoderCore,
    header_offset: usize,
    rx: Mutex<XcchRx>,
}

impl XcchDecoder {
    pub fn new(ctx: L1Context, tn: u8, mapping: TdmaMapping, header_offset: usize) -> Arc<XcchDecoder> {
        let core = DecoderCore::new(ctx, tn, mapping);
        Arc::new(XcchDecoder { core, header_offset, rx: Mutex::new(XcchRx::new()) })
    }

    fn process_burst(&self, burst: &RxBurst) {
        // The reverse index runs 0..3 as the bursts arrive; it is the "B"
        // index of GSM 05.03 4.1.4 and 4.1.5.
        let b = self.core.burst_index(burst.time(), 4);
        {
            let mut st = self.core.lock_state();
            self.core.process_phy_locked(&mut st, burst);
            // The first burst's time stamps the decoded frame
            if b == 0 {
                st.read_time = burst.time();
            }
        }

        let good = {
            let mut rx = self.rx.lock().expect("decoder fec lock poisoned");
            rx.accept_burst(b, burst);
            // The block is recognized when burst 3 arrives. A lost burst 3
            // loses the block; see the known limitation on discontinuities.
            if b != 3 {
                return;
            }
            rx.decode()
        };

        if good {
            self.handle_good_frame();
        } else {
            let mut st = self.core.lock_state();
            self.core.count_bad_frame_locked(&mut st);
        }
    }

    fn handle_good_frame(&self) {
        let (when, rssi, ta, fer) = {
            let mut st = self.core.lock_state();
            self.core.count_good_frame_locked(&mut st);
            (st.read_time, DecoderCore::rssi_locked(&mut st), DecoderCore::ta_locked(&mut st), st.fer)
        };

        let payload = {
            let mut rx = self.rx.lock().expect("decoder fec lock poisoned");
            let payload = rx.take_l2(self.header_offset);
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
                rx.u(),
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

impl BurstSink for XcchDecoder {
    fn write_low_side(&self, burst: &RxBurst) {
        if !self.core.active() {
            tracing::debug!("{}: not active, ignoring input", self.core.type_and_offset());
            return;
        }
        tracing::trace!("{}: rx {:?}", self.core.type_and_offset(), burst);
        self.process_burst(burst);
    }
}

impl DecoderHalf for XcchDecoder {
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
