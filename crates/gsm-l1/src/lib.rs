//! Layer-1 forward-error-correction and framing core of a GSM base-station
//! transceiver.
//!
//! Downlink: upper layer -> encoder -> block coder -> convolutional coder ->
//! interleaver -> bursts -> radio. Uplink: radio -> decoder -> deinterleaver
//! -> Viterbi -> parity -> upper layer. Channels are built as `L1Fec` pairs
//! against an injected `L1Context` (clock, config, tap) and attached to a
//! radio through the `gsm_saps` seams.

pub mod beacon;
pub mod clock;
pub mod components;
pub mod decoder;
pub mod encoder;
pub mod gsmtap;
pub mod l1fec;
pub mod rach;
pub mod sacch;
pub mod tch_facch;
pub mod xcch;

// Re-export commonly used items
pub use clock::{BtsClock, CancelToken};
pub use gsmtap::{FrameTap, TapMeta};
pub use l1fec::{DecoderHalf, EncoderHalf, L1Context, L1Fec, SacchL1, TchFacchL1};
