//! Service-access-point boundary of the L1 FEC core.
//!
//! `L2Frame` and `VocoderFrame` are the payload units crossing the boundary;
//! `SapMux` is the upstream sink (L2 and the vocoder path) and `ArfcnRadio`
//! is the downstream radio seam.

pub mod l2frame;
pub mod radio;
pub mod sapmux;
pub mod vocoder;

pub use l2frame::{FramePrimitive, L2Frame};
pub use radio::{ArfcnRadio, BurstSink};
pub use sapmux::SapMux;
pub use vocoder::VocoderFrame;
