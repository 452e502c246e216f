//! Channel lifecycle: assignment, link-loss and release-delay timers, and
//! the L2 primitive dispatch that drives them.

mod common;

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use common::{rx_from_tx, test_ctx_with_timers, MockMux, MockRadio};
use gsm_config::CfgTimers;
use gsm_l1::{DecoderHalf, EncoderHalf, L1Fec};
use gsm_saps::{ArfcnRadio, BurstSink, FramePrimitive, L2Frame, SapMux};

fn short_timers() -> CfgTimers {
    CfgTimers { t3101_ms: 150, t3109_ms: 400, t3111_ms: 100 }
}

fn build_sdcch() -> (Arc<MockRadio>, Arc<MockMux>, L1Fec) {
    let ctx = test_ctx_with_timers(short_timers());
    let radio = MockRadio::new();
    let mux = MockMux::new();
    let fec = L1Fec::sdcch(&ctx, 0, 0);
    fec.downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    fec.upstream(&(mux.clone() as Arc<dyn SapMux>));
    (radio, mux, fec)
}

fn l2_frame() -> L2Frame {
    L2Frame::new(FramePrimitive::Data, vec![0x2b; 23])
}

/// Run one good uplink block through the channel.
fn feed_good_frame(radio: &MockRadio, fec: &L1Fec) {
    fec.encoder().unwrap().write_high_side(l2_frame());
    let bursts = radio.take_bursts();
    assert_eq!(bursts.len(), 4);
    let sink = radio.decoders.lock().unwrap().get(&0).unwrap().clone();
    for b in &bursts {
        sink.write_low_side(&rx_from_tx(b, 15, -60.0, 0.0));
    }
}

#[test]
fn test_assignment_timeout_recycles_channel() {
    let (_radio, _mux, fec) = build_sdcch();
    fec.open();
    assert!(fec.active());
    assert!(!fec.decoder().unwrap().recyclable());

    // No uplink at all: T3101 runs out
    sleep(Duration::from_millis(250));
    assert!(fec.decoder().unwrap().recyclable());
    assert!(!fec.active());
}

#[test]
fn test_good_frame_defers_recycling_until_link_loss() {
    let (radio, mux, fec) = build_sdcch();
    fec.open();

    // A good frame before T3101 stops the assignment timer
    feed_good_frame(&radio, &fec);
    assert_eq!(mux.frames.lock().unwrap().len(), 1);

    sleep(Duration::from_millis(250));
    assert!(fec.active(), "good frame must stop T3101");

    // ...but with no further uplink, T3109 declares the link lost
    sleep(Duration::from_millis(300));
    assert!(fec.decoder().unwrap().recyclable());
    assert!(!fec.active());
}

#[test]
fn test_close_arms_release_delay() {
    let (_radio, _mux, fec) = build_sdcch();
    fec.open();
    fec.close();
    assert!(!fec.active());
    // Not recyclable until T3111 has run
    assert!(!fec.decoder().unwrap().recyclable());
    sleep(Duration::from_millis(150));
    assert!(fec.decoder().unwrap().recyclable());
}

#[test]
fn test_establish_opens_both_sides() {
    let (_radio, _mux, fec) = build_sdcch();
    assert!(!fec.active());

    fec.encoder().unwrap().write_high_side(L2Frame::control(FramePrimitive::Establish));
    assert!(fec.decoder().unwrap().active());
    assert!(fec.encoder().unwrap().active());

    fec.encoder().unwrap().write_high_side(L2Frame::control(FramePrimitive::Release));
    assert!(!fec.decoder().unwrap().active());
    sleep(Duration::from_millis(150));
    assert!(fec.decoder().unwrap().recyclable());
}

#[test]
fn test_error_closes_transmitter_only() {
    let (radio, _mux, fec) = build_sdcch();
    fec.open();
    feed_good_frame(&radio, &fec);

    fec.encoder().unwrap().write_high_side(L2Frame::control(FramePrimitive::Error));
    // The receiver keeps running and will time out on its own
    assert!(fec.decoder().unwrap().active());
    assert!(!fec.encoder().unwrap().active());
}

#[test]
fn test_decoder_ignores_bursts_when_closed() {
    let (radio, mux, fec) = build_sdcch();
    fec.open();

    fec.encoder().unwrap().write_high_side(l2_frame());
    let bursts = radio.take_bursts();
    fec.close();

    let sink = radio.decoders.lock().unwrap().get(&0).unwrap().clone();
    for b in &bursts {
        sink.write_low_side(&rx_from_tx(b, 15, -60.0, 0.0));
    }
    assert!(mux.frames.lock().unwrap().is_empty());
}
