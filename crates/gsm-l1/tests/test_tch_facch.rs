//! End-to-end TCH/FACCH: speech loopback over 8 bursts, stealing, and the
//! downlink priority rules.

mod common;

use std::sync::Arc;

use common::{rx_from_tx, test_ctx, MockMux, MockRadio};
use gsm_core::burst::{BURST_HL, BURST_HU};
use gsm_l1::{EncoderHalf, TchFacchL1};
use gsm_saps::{ArfcnRadio, BurstSink, FramePrimitive, L2Frame, SapMux, VocoderFrame};

fn speech_frame(seed: usize) -> VocoderFrame {
    let bits: Vec<u8> = (0..260).map(|i| (((i + seed) * 13) % 7 < 3) as u8).collect();
    VocoderFrame::from_payload_bits(&bits)
}

fn build_channel() -> (gsm_l1::L1Context, Arc<MockRadio>, Arc<MockMux>, TchFacchL1) {
    let ctx = test_ctx();
    let radio = MockRadio::new();
    let mux = MockMux::new();
    let tch = TchFacchL1::new(&ctx, 2);
    tch.fec().downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    tch.fec().upstream(&(mux.clone() as Arc<dyn SapMux>));
    tch.fec().open();
    (ctx, radio, mux, tch)
}

#[test]
fn test_speech_roundtrip_over_two_slots() {
    let (_ctx, radio, mux, tch) = build_channel();

    let sent = speech_frame(1);
    tch.send_speech_frame(sent);

    // Slot 1 carries the first diagonal half, slot 2 (filler) the second
    tch.encoder().dispatch();
    tch.encoder().dispatch();
    let bursts = radio.take_bursts();
    assert_eq!(bursts.len(), 8);
    for b in &bursts {
        // Nothing stolen: both flags clear
        assert_eq!(b.bits()[BURST_HU], 0);
        assert_eq!(b.bits()[BURST_HL], 0);
    }

    let sink = radio.decoders.lock().unwrap().get(&2).unwrap().clone();
    for b in &bursts {
        sink.write_low_side(&rx_from_tx(b, 0, -58.0, 0.4));
    }

    // The first extraction (mid-diagonal) conceals; the second recovers the
    // frame bit-exact.
    let speech = mux.speech.lock().unwrap();
    assert!(!speech.is_empty());
    assert_eq!(*speech.last().unwrap(), sent);
}

#[test]
fn test_facch_steals_tch() {
    let (_ctx, radio, mux, tch) = build_channel();

    // One speech frame and one FACCH frame queued: the FACCH wins the slot
    // and the speech frame is dropped to bound latency.
    tch.send_speech_frame(speech_frame(2));
    let l2: Vec<u8> = (0..23).map(|i| (i as u8) ^ 0xa5).collect();
    tch.encoder().write_high_side(L2Frame::new(FramePrimitive::Data, l2.clone()));

    tch.encoder().dispatch();
    let slot1 = radio.take_bursts();
    assert_eq!(slot1.len(), 4);
    for b in &slot1 {
        assert_eq!(b.bits()[BURST_HU], 1, "current slot must flag stealing upward");
        assert_eq!(b.bits()[BURST_HL], 0, "previous slot was not stolen");
    }
    assert_eq!(tch.encoder().speech_queue_len(), 0, "speech queue must be flushed");

    // The following slot idles but still carries the history flag
    tch.encoder().dispatch();
    let slot2 = radio.take_bursts();
    assert_eq!(slot2.len(), 4);
    for b in &slot2 {
        assert_eq!(b.bits()[BURST_HU], 0);
        assert_eq!(b.bits()[BURST_HL], 1);
    }

    // Feed both slots back: the stolen block decodes as signalling
    let sink = radio.decoders.lock().unwrap().get(&2).unwrap().clone();
    for b in slot1.iter().chain(slot2.iter()) {
        sink.write_low_side(&rx_from_tx(b, 0, -60.0, 0.0));
    }
    let frames = mux.frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame.data(), &l2[..]);
}

#[test]
fn test_speech_latency_cap_drops_oldest() {
    let (ctx, radio, _mux, tch) = build_channel();

    let max_latency = ctx.config.config().radioctl.max_speech_latency;
    for i in 0..max_latency + 5 {
        tch.send_speech_frame(speech_frame(i));
    }
    tch.encoder().dispatch();
    assert_eq!(radio.take_bursts().len(), 4);
    // One frame was sent this slot; the backlog is capped
    assert!(tch.encoder().speech_queue_len() <= max_latency);
}

#[test]
fn test_filler_when_idle() {
    let (_ctx, radio, _mux, tch) = build_channel();

    // No data queued: the slot still transmits
    tch.encoder().dispatch();
    let bursts = radio.take_bursts();
    assert_eq!(bursts.len(), 4);
    let mut ones = 0u32;
    for b in &bursts {
        assert_eq!(b.bits()[BURST_HU], 0);
        ones += b.bits()[3..60].iter().map(|&x| x as u32).sum::<u32>();
        ones += b.bits()[88..145].iter().map(|&x| x as u32).sum::<u32>();
    }
    // Payload is the captured filler pattern, not dead air
    assert!(ones > 0);
}
