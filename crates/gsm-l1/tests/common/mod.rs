//! Shared fixtures: a capturing radio, a capturing upper layer, and context
//! builders with test-friendly timer values.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gsm_config::{Band, CfgCellInfo, CfgRadioCtl, CfgTimers, SharedConfig, StackConfig};
use gsm_core::burst::BURST_BITS;
use gsm_core::{GsmTime, RxBurst, TxBurst};
use gsm_l1::{BtsClock, L1Context};
use gsm_saps::{ArfcnRadio, BurstSink, L2Frame, SapMux, VocoderFrame};

pub struct MockRadio {
    pub bursts: Mutex<Vec<TxBurst>>,
    pub decoders: Mutex<HashMap<u8, Arc<dyn BurstSink>>>,
}

impl MockRadio {
    pub fn new() -> Arc<MockRadio> {
        Arc::new(MockRadio { bursts: Mutex::new(Vec::new()), decoders: Mutex::new(HashMap::new()) })
    }

    pub fn take_bursts(&self) -> Vec<TxBurst> {
        std::mem::take(&mut self.bursts.lock().unwrap())
    }
}

impl ArfcnRadio for MockRadio {
    fn write_high_side(&self, burst: TxBurst) {
        self.bursts.lock().unwrap().push(burst);
    }

    fn install_decoder(&self, tn: u8, decoder: Arc<dyn BurstSink>) {
        self.decoders.lock().unwrap().insert(tn, decoder);
    }

    fn arfcn(&self) -> u16 {
        51
    }
}

#[derive(Debug)]
pub struct UpFrame {
    pub frame: L2Frame,
    pub when: GsmTime,
    pub rssi: f32,
    pub ta: u8,
    pub fer: f32,
}

#[derive(Debug)]
pub struct UpSacchFrame {
    pub frame: L2Frame,
    pub actual_ms_power: i32,
    pub actual_ms_timing: f32,
}

pub struct MockMux {
    pub frames: Mutex<Vec<UpFrame>>,
    pub sacch_frames: Mutex<Vec<UpSacchFrame>>,
    pub speech: Mutex<Vec<VocoderFrame>>,
    pub next_wtimes: Mutex<Vec<GsmTime>>,
}

impl MockMux {
    pub fn new() -> Arc<MockMux> {
        Arc::new(MockMux {
            frames: Mutex::new(Vec::new()),
            sacch_frames: Mutex::new(Vec::new()),
            speech: Mutex::new(Vec::new()),
            next_wtimes: Mutex::new(Vec::new()),
        })
    }
}

impl SapMux for MockMux {
    fn write_low_side(&self, frame: L2Frame, when: GsmTime, rssi: f32, ta: u8, fer: f32) {
        self.frames.lock().unwrap().push(UpFrame { frame, when, rssi, ta, fer });
    }

    fn write_low_side_sacch(
        &self,
        frame: L2Frame,
        when: GsmTime,
        rssi: f32,
        ta: u8,
        fer: f32,
        actual_ms_power: i32,
        actual_ms_timing: f32,
    ) {
        self.frames.lock().unwrap().push(UpFrame { frame: frame.clone(), when, rssi, ta, fer });
        self.sacch_frames.lock().unwrap().push(UpSacchFrame { frame, actual_ms_power, actual_ms_timing });
    }

    fn write_low_side_tch(&self, frame: VocoderFrame, _when: GsmTime, _rssi: f32, _ta: u8, _fer: f32) {
        self.speech.lock().unwrap().push(frame);
    }

    fn signal_next_wtime(&self, when: GsmTime) {
        self.next_wtimes.lock().unwrap().push(when);
    }
}

pub fn test_config(timers: CfgTimers) -> SharedConfig {
    SharedConfig::from_config(StackConfig {
        debug_log: None,
        cell: CfgCellInfo { band: Band::Egsm900, arfcn: 51, ncc: 0, bcc: 2 },
        radioctl: CfgRadioCtl::default(),
        timers,
    })
}

/// Context with default timers and the clock parked just before frame 0, so
/// the first scheduled slot of a 51- or 26-multiframe channel is imminent.
pub fn test_ctx() -> L1Context {
    test_ctx_with_timers(CfgTimers::default())
}

pub fn test_ctx_with_timers(timers: CfgTimers) -> L1Context {
    let clock = Arc::new(BtsClock::new());
    clock.set(gsm_core::HYPERFRAME - 2);
    L1Context::new(test_config(timers), clock)
}

/// Loopback: a received burst with ideal symbols, time-shifted onto the
/// uplink mapping of the channel.
pub fn rx_from_tx(burst: &TxBurst, frame_shift: i32, rssi: f32, timing_error: f32) -> RxBurst {
    let mut soft = [0.0f32; BURST_BITS];
    for (s, &b) in soft.iter_mut().zip(burst.bits().iter()) {
        *s = b as f32;
    }
    RxBurst::new(soft, burst.time().add_frames(frame_shift), rssi, timing_error)
}
