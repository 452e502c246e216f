//! RACH access decoding through the bounded queue and service thread.

mod common;

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use common::{test_ctx, MockMux, MockRadio};
use gsm_core::bits::{fill_field, lsb8msb, unpack_bytes};
use gsm_core::burst::{ACCESS_DATA, ACCESS_DATA_BITS, BURST_BITS};
use gsm_core::{GsmTime, RxBurst};
use gsm_l1::components::convenc::ConvEncState;
use gsm_l1::components::parity::{
    ParityBlockCoder, RACH_CODEWORD_BITS, RACH_GENERATOR, RACH_PARITY_BITS,
};
use gsm_l1::L1Fec;
use gsm_saps::{ArfcnRadio, BurstSink, SapMux};

/// Build the 36 coded symbols of an access burst, GSM 05.03 4.6.
fn access_burst(ra: u8, bsic: u8, time: GsmTime, rssi: f32, timing_error: f32) -> RxBurst {
    let mut u = [0u8; 18];
    let mut d = unpack_bytes(&[ra]);
    lsb8msb(&mut d);
    u[0..8].copy_from_slice(&d);

    // The 6-bit parity goes out inverted and XOR'd with the BSIC
    let coder = ParityBlockCoder::new(RACH_GENERATOR, RACH_PARITY_BITS, RACH_CODEWORD_BITS);
    let parity = coder.parity(&u[0..8]);
    fill_field(&mut u, 8, 6, !(parity ^ bsic as u64) & 0x3f);
    // Tail u[14..18) stays zero

    let mut e = [0u8; ACCESS_DATA_BITS];
    let mut enc = ConvEncState::new();
    enc.encode(&u, &mut e);

    let mut soft = [0.0f32; BURST_BITS];
    for (i, &b) in e.iter().enumerate() {
        soft[ACCESS_DATA + i] = b as f32;
    }
    RxBurst::new(soft, time, rssi, timing_error)
}

#[test]
fn test_valid_access_delivers_ra_and_ta() {
    let ctx = test_ctx();
    let radio = MockRadio::new();
    let mux = MockMux::new();

    let fec = L1Fec::rach(&ctx);
    fec.downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    fec.upstream(&(mux.clone() as Arc<dyn SapMux>));
    fec.open();
    fec.start();

    // BSIC of the test cell is 2 (NCC 0, BCC 2)
    let sink = radio.decoders.lock().unwrap().get(&0).unwrap().clone();
    sink.write_low_side(&access_burst(0x5a, 2, GsmTime::new(100, 0), -55.0, 4.3));

    sleep(Duration::from_millis(300));
    fec.stop();

    let frames = mux.frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame.data(), &[0x5a]);
    assert_eq!(frames[0].when, GsmTime::new(100, 0));
    assert_eq!(frames[0].rssi, -55.0);
    assert_eq!(frames[0].ta, 4);
}

#[test]
fn test_foreign_bsic_is_dropped() {
    let ctx = test_ctx();
    let radio = MockRadio::new();
    let mux = MockMux::new();

    let fec = L1Fec::rach(&ctx);
    fec.downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    fec.upstream(&(mux.clone() as Arc<dyn SapMux>));
    fec.open();
    fec.start();

    // Parity consistent with a neighbour's BSIC: must not be delivered
    let sink = radio.decoders.lock().unwrap().get(&0).unwrap().clone();
    sink.write_low_side(&access_burst(0x17, 5, GsmTime::new(200, 0), -70.0, 0.0));

    sleep(Duration::from_millis(300));
    fec.stop();

    assert!(mux.frames.lock().unwrap().is_empty());
}

#[test]
fn test_nonzero_tail_is_dropped() {
    let ctx = test_ctx();
    let radio = MockRadio::new();
    let mux = MockMux::new();

    let fec = L1Fec::rach(&ctx);
    fec.downstream(&(radio.clone() as Arc<dyn ArfcnRadio>));
    fec.upstream(&(mux.clone() as Arc<dyn SapMux>));
    fec.open();
    fec.start();

    // A valid burst re-encoded with a corrupted tail region
    let mut u = [0u8; 18];
    let mut d = unpack_bytes(&[0x5au8]);
    lsb8msb(&mut d);
    u[0..8].copy_from_slice(&d);
    let coder = ParityBlockCoder::new(RACH_GENERATOR, RACH_PARITY_BITS, RACH_CODEWORD_BITS);
    let parity = coder.parity(&u[0..8]);
    fill_field(&mut u, 8, 6, !(parity ^ 2) & 0x3f);
    u[15] = 1;
    let mut e = [0u8; ACCESS_DATA_BITS];
    ConvEncState::new().encode(&u, &mut e);
    let mut soft = [0.0f32; BURST_BITS];
    for (i, &b) in e.iter().enumerate() {
        soft[ACCESS_DATA + i] = b as f32;
    }
    let sink = radio.decoders.lock().unwrap().get(&0).unwrap().clone();
    sink.write_low_side(&RxBurst::new(soft, GsmTime::new(300, 0), -55.0, 0.0));

    sleep(Duration::from_millis(300));
    fec.stop();

    assert!(mux.frames.lock().unwrap().is_empty());
}
