//! SACCH loopback: physical header, reported actuals, and the ordered
//! power/timing responding to uplink measurements.

mod common;

use std::sync::Arc;

use common::{rx_from_tx, test_ctx, MockMux, MockRadio};
use gsm_l1::{EncoderHalf, SacchL1};
use gsm_saps::{ArfcnRadio, BurstSink, FramePrimitive, L2Frame, SapMux};

fn sacch_l2(seed: u8) -> L2Frame {
    // SACCH payload is 21 octets behind the 2-byte physical header
    let data: Vec<u8> = (0..21).map(|i| (i as u8).wrapping_mul(29).wrapping_add(seed)).collect();
    L2Frame::new(FramePrimitive::Data, data)
}

#[test]
fn test_loopback_carries_header_and_payload() {
    let ctx = test_ctx();
    let radio = MockRadio::new();
    let mux = MockMux::new();

    let sacch = SacchL1::for_tch(&ctx, 2);
    sacch.fec().downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    sacch.fec().upstream(&(mux.clone() as Arc<dyn SapMux>));
    sacch.fec().open();

    let sent = sacch_l2(3);
    sacch.encoder().write_high_side(sent.clone());
    let bursts = radio.take_bursts();
    assert_eq!(bursts.len(), 4);
    // SACCH/TF on an even timeslot: frames 12, 38, 64, 90 of the 104-cycle
    for (i, b) in bursts.iter().enumerate() {
        assert_eq!(b.time().f % 104, 12 + 26 * i as u32);
        assert_eq!(b.time().t, 2);
    }

    let sink = radio.decoders.lock().unwrap().get(&2).unwrap().clone();
    for b in &bursts {
        sink.write_low_side(&rx_from_tx(b, 0, -60.0, 0.0));
    }

    let frames = mux.sacch_frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame, sent);
    // Without uplink measurements the initial orders went out: max power,
    // zero timing advance. The loopback reports them back as actuals.
    assert_eq!(frames[0].actual_ms_power, 33);
    assert_eq!(frames[0].actual_ms_timing, 0.0);
}

#[test]
fn test_orders_follow_measurements() {
    let ctx = test_ctx();
    let radio = MockRadio::new();
    let mux = MockMux::new();

    let sacch = SacchL1::for_tch(&ctx, 2);
    sacch.fec().downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    sacch.fec().upstream(&(mux.clone() as Arc<dyn SapMux>));
    sacch.fec().open();

    // Uplink 10 dB hot (target -50), handset 3 symbols late
    sacch.decoder().set_phy(-40.0, 3.0);
    sacch.encoder().write_high_side(sacch_l2(4));
    assert_eq!(radio.take_bursts().len(), 4);

    // Power: target 33 - 10 = 23, damping 75% -> 0.75*33 + 0.25*23
    assert!((sacch.encoder().ordered_ms_power() - 30.5).abs() < 0.01);
    // Timing: target 0 + 3, damping 50% -> 1.5
    assert!((sacch.encoder().ordered_ms_timing() - 1.5).abs() < 0.01);
}

#[test]
fn test_stale_measurements_leave_orders_alone() {
    let ctx = test_ctx();
    let radio = MockRadio::new();
    let mux = MockMux::new();

    let sacch = SacchL1::for_tch(&ctx, 2);
    sacch.fec().downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    sacch.fec().upstream(&(mux.clone() as Arc<dyn SapMux>));
    sacch.fec().open();

    sacch.decoder().set_phy(-40.0, 3.0);
    sacch.encoder().write_high_side(sacch_l2(5));
    radio.take_bursts();
    let power_after_first = sacch.encoder().ordered_ms_power();

    // No new measurements between frames: the loop must not run again
    sacch.encoder().write_high_side(sacch_l2(6));
    radio.take_bursts();
    assert_eq!(sacch.encoder().ordered_ms_power(), power_after_first);
}

#[test]
fn test_initial_assignment_sets_undamped_orders() {
    let ctx = test_ctx();
    let radio = MockRadio::new();

    let sacch = SacchL1::for_tch(&ctx, 4);
    sacch.fec().downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    sacch.fec().open();

    // Access burst measured 5 dB below target, 2.5 symbols late
    sacch.set_phy(-55.0, 2.5);
    // No damping history on an initial assignment: straight to the target
    assert!((sacch.encoder().ordered_ms_power() - 33.0).abs() < 0.01);
    assert!((sacch.encoder().ordered_ms_timing() - 2.5).abs() < 0.01);
}
