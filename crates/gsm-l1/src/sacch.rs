//! SACCH: XCCH plus a 2-byte physical header carrying the ordered MS power
//! and timing advance, with the closed-loop control law of GSM 05.08 4 and
//! GSM 05.10 5/6 driving both from the uplink measurements.

use std::sync::{Arc, Mutex, Weak};

use gsm_core::bits::peek_field;
use gsm_core::{RxBurst, TdmaMapping, TxBurst};
use gsm_saps::{ArfcnRadio, BurstSink, FramePrimitive, L2Frame, SapMux};

use crate::components::power::{decode_power, encode_power};
use crate::decoder::DecoderCore;
use crate::encoder::EncoderCore;
use crate::gsmtap::{tap, TapMeta, TAP_BURST_NORMAL};
use crate::l1fec::{DecoderHalf, EncoderHalf, L1Context};
use crate::xcch::{transmit_block, XcchRx, XcchTx};

/// The physical header occupies u[0..16).
pub const SACCH_HEADER_BITS: usize = 16;

/// Power and TA the handset is assumed to use right after an access burst:
/// maximum power, zero advance.
const INITIAL_MS_POWER_DBM: i32 = 33;
const INITIAL_MS_TIMING: f32 = 0.0;

/// The handset's reported settings, parsed from the uplink physical header.
struct SacchActuals {
    actual_ms_power: i32,
    actual_ms_timing: f32,
}

/// SACCH decoder: XCCH plus the physical-header parse.
pub struct SacchDecoder {
    core: DecoderCore,
    rx: Mutex<XcchRx>,
    actuals: Mutex<SacchActuals>,
}

impl SacchDecoder {
    pub fn new(ctx: L1Context, tn: u8, mapping: TdmaMapping) -> Arc<SacchDecoder> {
        let core = DecoderCore::new(ctx, tn, mapping);
        Arc::new(SacchDecoder {
            core,
            rx: Mutex::new(XcchRx::new()),
            actuals: Mutex::new(SacchActuals {
                actual_ms_power: INITIAL_MS_POWER_DBM,
                actual_ms_timing: INITIAL_MS_TIMING,
            }),
        })
    }

    pub fn actual_ms_power(&self) -> i32 {
        self.actuals.lock().expect("sacch actuals lock poisoned").actual_ms_power
    }

    pub fn actual_ms_timing(&self) -> f32 {
        self.actuals.lock().expect("sacch actuals lock poisoned").actual_ms_timing
    }

    /// True if uplink measurements arrived since the last control pass.
    pub fn phy_new(&self) -> bool {
        self.core.lock_state().phy_new
    }

    /// Mean uplink RSSI; clears the new-measurement flag.
    pub fn rssi(&self) -> f32 {
        DecoderCore::rssi_locked(&mut self.core.lock_state())
    }

    /// Mean uplink timing error; clears the new-measurement flag.
    pub fn timing_error(&self) -> f32 {
        DecoderCore::timing_error_locked(&mut self.core.lock_state())
    }

    /// Initialize the measurement rings from the access burst that triggered
    /// the assignment.
    pub fn set_phy(&self, rssi: f32, timing_error: f32) {
        let mut st = self.core.lock_state();
        st.rssi = [rssi; 4];
        st.timing_error = [timing_error; 4];
        st.phy_new = true;
        tracing::info!("{}: set_phy RSSI={:.1} timingError={:.2}", self.core.type_and_offset(), rssi, timing_error);
    }

    /// Initialize from a pre-existing established channel.
    pub fn set_phy_from(&self, other: &SacchDecoder) {
        {
            let other_st = other.core.lock_state();
            let mut st = self.core.lock_state();
            st.rssi = other_st.rssi;
            st.timing_error = other_st.timing_error;
            st.phy_new = true;
        }
        let other_actuals = other.actuals.lock().expect("sacch actuals lock poisoned");
        let mut actuals = self.actuals.lock().expect("sacch actuals lock poisoned");
        actuals.actual_ms_power = other_actuals.actual_ms_power;
        actuals.actual_ms_timing = other_actuals.actual_ms_timing;
    }

    fn process_burst(&self, burst: &RxBurst) {
        let b = self.core.burst_index(burst.time(), 4);
        {
            let mut st = self.core.lock_state();
            self.core.process_phy_locked(&mut st, burst);
            if b == 0 {
                st.read_time = burst.time();
            }
        }

        let good = {
            let mut rx = self.rx.lock().expect("decoder fec lock poisoned");
            rx.accept_burst(b, burst);
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

        let (payload, power, timing) = {
            let mut rx = self.rx.lock().expect("decoder fec lock poisoned");
            let payload = rx.take_l2(SACCH_HEADER_BITS);

            // Physical header, GSM 04.04 7: the handset reports its power
            // in u[3..8) and its timing advance in u[9..16).
            let band = self.core.ctx().config.config().cell.band;
            let power = decode_power(band, peek_field(rx.u(), 3, 5) as u8);
            let ta_field = peek_field(rx.u(), 9, 7);
            let timing = if ta_field < 64 { Some(ta_field as f32) } else { None };

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
            (payload, power, timing)
        };

        let actual_timing = {
            let mut actuals = self.actuals.lock().expect("sacch actuals lock poisoned");
            actuals.actual_ms_power = power;
            if let Some(t) = timing {
                actuals.actual_ms_timing = t;
            }
            actuals.actual_ms_timing
        };
        tracing::info!("{}: actuals pow={} TA={:.1}", self.core.type_and_offset(), power, actual_timing);

        let Some(mux) = self.core.upstream() else {
            tracing::warn!("{}: no upstream connected, dropping frame", self.core.type_and_offset());
            return;
        };
        mux.write_low_side_sacch(
            L2Frame::new(FramePrimitive::Data, payload),
            when,
            rssi,
            ta,
            fer,
            power,
            actual_timing,
        );
    }
}

impl BurstSink for SacchDecoder {
    fn write_low_side(&self, burst: &RxBurst) {
        if !self.core.active() {
            tracing::debug!("{}: not active, ignoring input", self.core.type_and_offset());
            return;
        }
        self.process_burst(burst);
    }
}

impl DecoderHalf for SacchDecoder {
    fn open(&self) {
        self.core.open();
        // The handset sent its access burst at max power with zero advance
        let mut actuals = self.actuals.lock().expect("sacch actuals lock poisoned");
        actuals.actual_ms_power = INITIAL_MS_POWER_DBM;
        actuals.actual_ms_timing = INITIAL_MS_TIMING;
        // Measured values should be set after opening with set_phy
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

/// Closed-loop state: the orders currently being damped toward their
/// targets.
struct PowerLoop {
    ordered_ms_power: f32,
    ordered_ms_timing: f32,
}

/// SACCH encoder: writes the physical header, running the closed-loop
/// control law when fresh uplink measurements are available.
pub struct SacchEncoder {
    core: EncoderCore,
    tx: Mutex<XcchTx>,
    decoder: Weak<SacchDecoder>,
    ploop: Mutex<PowerLoop>,
}

impl SacchEncoder {
    pub fn new(ctx: L1Context, tn: u8, mapping: TdmaMapping, decoder: Weak<SacchDecoder>) -> Arc<SacchEncoder> {
        let tsc = ctx.bcc();
        let core = EncoderCore::new(ctx, tn, mapping, TxBurst::dummy());
        Arc::new(SacchEncoder {
            core,
            tx: Mutex::new(XcchTx::new(tsc)),
            decoder,
            ploop: Mutex::new(PowerLoop {
                ordered_ms_power: INITIAL_MS_POWER_DBM as f32,
                ordered_ms_timing: INITIAL_MS_TIMING,
            }),
        })
    }

    pub fn ordered_ms_power(&self) -> f32 {
        self.ploop.lock().expect("power loop lock poisoned").ordered_ms_power
    }

    pub fn ordered_ms_timing(&self) -> f32 {
        self.ploop.lock().expect("power loop lock poisoned").ordered_ms_timing
    }

    /// Undamped first ordering for an initial assignment, directly from the
    /// access-burst measurements.
    pub fn set_phy_initial(&self) {
        let Some(sib) = self.decoder.upgrade() else {
            return;
        };
        let cfg = self.core.ctx().config.config();
        let rssi = sib.rssi();
        let delta_p = rssi - cfg.radioctl.rssi_target;
        let timing_error = sib.timing_error();

        let mut ploop = self.ploop.lock().expect("power loop lock poisoned");
        ploop.ordered_ms_power = (sib.actual_ms_power() as f32 - delta_p)
            .clamp(cfg.radioctl.ms_power_min as f32, cfg.radioctl.ms_power_max as f32);
        ploop.ordered_ms_timing =
            (sib.actual_ms_timing() + timing_error).clamp(0.0, cfg.radioctl.ta_max as f32);
        tracing::info!(
            "{}: initial orders pow={:.1} TA={:.1}",
            self.core.type_and_offset(),
            ploop.ordered_ms_power,
            ploop.ordered_ms_timing
        );
    }

    /// Copy the orders of a pre-existing established channel.
    pub fn set_phy_from(&self, other: &SacchEncoder) {
        let other_loop = other.ploop.lock().expect("power loop lock poisoned");
        let mut ploop = self.ploop.lock().expect("power loop lock poisoned");
        ploop.ordered_ms_power = other_loop.ordered_ms_power;
        ploop.ordered_ms_timing = other_loop.ordered_ms_timing;
    }

    /// One pass of the control law, GSM 05.08 4 and GSM 05.10 5/6: move each
    /// order toward its target with exponential damping, then clamp.
    fn update_orders(&self) {
        let Some(sib) = self.decoder.upgrade() else {
            return;
        };
        if !sib.phy_new() {
            return;
        }
        let cfg = self.core.ctx().config.config();

        // Power expressed in dBm, RSSI in dB wrt full scale
        let rssi = sib.rssi();
        let delta_p = rssi - cfg.radioctl.rssi_target;
        let actual_power = sib.actual_ms_power() as f32;
        let target_power = actual_power - delta_p;
        let power_damping = cfg.radioctl.power_damping as f32 * 0.01;

        // Time expressed in symbol periods
        let timing_error = sib.timing_error();
        let actual_timing = sib.actual_ms_timing();
        let target_timing = actual_timing + timing_error;
        let ta_damping = cfg.radioctl.ta_damping as f32 * 0.01;

        let mut ploop = self.ploop.lock().expect("power loop lock poisoned");
        ploop.ordered_ms_power = (power_damping * ploop.ordered_ms_power
            + (1.0 - power_damping) * target_power)
            .clamp(cfg.radioctl.ms_power_min as f32, cfg.radioctl.ms_power_max as f32);
        ploop.ordered_ms_timing = (ta_damping * ploop.ordered_ms_timing
            + (1.0 - ta_damping) * target_timing)
            .clamp(0.0, cfg.radioctl.ta_max as f32);

        tracing::info!(
            "{}: RSSI={:.1} target={:.1} deltaP={:.1} actual={:.1} order={:.1} TE={:.2} orderTA={:.1}",
            self.core.type_and_offset(),
            rssi,
            cfg.radioctl.rssi_target,
            delta_p,
            actual_power,
            ploop.ordered_ms_power,
            timing_error,
            ploop.ordered_ms_timing
        );
    }

    fn send_frame(&self, frame: &L2Frame) {
        let Some(radio) = self.core.radio().cloned() else {
            tracing::warn!("{}: no downstream radio, dropping frame", self.core.type_and_offset());
            return;
        };

        self.update_orders();

        let next = {
            let mut tx = self.tx.lock().expect("encoder fec lock poisoned");

            // Physical header, GSM 04.04 6.1, 7.1
            let band = self.core.ctx().config.config().cell.band;
            let (power_code, timing) = {
                let ploop = self.ploop.lock().expect("power loop lock poisoned");
                (
                    encode_power(band, ploop.ordered_ms_power.round() as i32),
                    (ploop.ordered_ms_timing + 0.5) as u64,
                )
            };
            tx.fill_u_field(0, 8, power_code as u64);
            tx.fill_u_field(8, 8, timing & 0xff);

            tx.encode_frame(frame.data(), SACCH_HEADER_BITS);

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

impl EncoderHalf for SacchEncoder {
    fn open(&self) {
        self.core.open();
        let mut ploop = self.ploop.lock().expect("power loop lock poisoned");
        ploop.ordered_ms_power = INITIAL_MS_POWER_DBM as f32;
        ploop.ordered_ms_timing = INITIAL_MS_TIMING;
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
}
