//! The L1FEC pair: one encoder and one decoder for a logical channel.
//!
//! The pair exclusively owns its halves. Each half reaches its sibling
//! through a weak reference set at construction, so ESTABLISH/RELEASE on the
//! encoder can open or close the decoder without an ownership cycle.

use std::sync::{Arc, Weak};

use gsm_config::SharedConfig;
use gsm_core::TypeAndOffset;
use gsm_saps::{ArfcnRadio, BurstSink, L2Frame, SapMux};

use crate::beacon::{FcchEncoder, SchEncoder};
use crate::clock::BtsClock;
use crate::gsmtap::FrameTap;
use crate::rach::RachDecoder;
use crate::sacch::{SacchDecoder, SacchEncoder};
use crate::tch_facch::{TchFacchDecoder, TchFacchEncoder};
use crate::xcch::{XcchDecoder, XcchEncoder};

/// Process-wide context injected into every channel: the shared clock, the
/// configuration, and the optional frame tap. No module-level mutable state.
#[derive(Clone)]
pub struct L1Context {
    pub config: SharedConfig,
    pub clock: Arc<BtsClock>,
    pub tap: Option<Arc<dyn FrameTap>>,
}

impl L1Context {
    pub fn new(config: SharedConfig, clock: Arc<BtsClock>) -> L1Context {
        L1Context { config, clock, tap: None }
    }

    pub fn with_tap(mut self, tap: Arc<dyn FrameTap>) -> L1Context {
        self.tap = Some(tap);
        self
    }

    /// Base Station Identity Code, 6 bits.
    pub fn bsic(&self) -> u8 {
        self.config.config().cell.bsic()
    }

    /// Base-station colour code; doubles as the training sequence code.
    pub fn bcc(&self) -> u8 {
        self.config.config().cell.bcc
    }
}

/// Transmit half of a channel.
pub trait EncoderHalf: Send + Sync {
    fn open(&self);
    fn close(&self);
    fn active(&self) -> bool;
    /// Accept an L2 frame by its primitive kind (DATA, ESTABLISH, RELEASE,
    /// ERROR).
    fn write_high_side(&self, frame: L2Frame);
    fn set_downstream(&self, radio: Arc<dyn ArfcnRadio>);
    fn set_upstream(&self, mux: Arc<dyn SapMux>);
    fn set_sibling(&self, sibling: Weak<dyn DecoderHalf>);
    fn type_and_offset(&self) -> TypeAndOffset;
    /// Spawn the service thread, if this channel has one.
    fn start(&self) {}
    /// Cancel and join the service thread.
    fn stop(&self) {}
}

/// Receive half of a channel. Burst ingress happens through the `BurstSink`
/// registered with the radio.
pub trait DecoderHalf: Send + Sync {
    fn open(&self);
    fn close(&self);
    fn active(&self) -> bool;
    /// True once any lifecycle timer has expired and the channel may be
    /// reallocated.
    fn recyclable(&self) -> bool;
    fn set_upstream(&self, mux: Arc<dyn SapMux>);
    fn start(&self) {}
    fn stop(&self) {}
}

/// An encoder/decoder pair for one logical channel. Either half may be
/// absent (BCCH has no decoder, RACH has no encoder).
pub struct L1Fec {
    encoder: Option<Arc<dyn EncoderHalf>>,
    decoder: Option<Arc<dyn DecoderHalf>>,
    /// The decoder again, as the radio-facing burst sink
    decoder_sink: Option<Arc<dyn BurstSink>>,
    tn: u8,
}

impl L1Fec {
    fn new(
        tn: u8,
        encoder: Option<Arc<dyn EncoderHalf>>,
        decoder: Option<Arc<dyn DecoderHalf>>,
        decoder_sink: Option<Arc<dyn BurstSink>>,
    ) -> L1Fec {
        L1Fec { encoder, decoder, decoder_sink, tn }
    }

    /// SDCCH/8 subchannel: bidirectional XCCH.
    pub fn sdcch(ctx: &L1Context, tn: u8, subchannel: u8) -> L1Fec {
        let encoder = XcchEncoder::new(ctx.clone(), tn, gsm_core::tdma_mapping::sdcch8_mapping(subchannel, true), 0);
        let decoder = XcchDecoder::new(ctx.clone(), tn, gsm_core::tdma_mapping::sdcch8_mapping(subchannel, false), 0);
        encoder.set_sibling(Arc::downgrade(&decoder) as Weak<dyn DecoderHalf>);
        L1Fec::new(tn, Some(encoder), Some(decoder.clone()), Some(decoder))
    }

    /// BCCH: downlink-only XCCH.
    pub fn bcch(ctx: &L1Context) -> L1Fec {
        let encoder = XcchEncoder::new(ctx.clone(), 0, gsm_core::tdma_mapping::BCCH_MAPPING, 0);
        L1Fec::new(0, Some(encoder), None, None)
    }

    /// One CCCH block (AGCH/PCH): downlink-only XCCH.
    pub fn ccch(ctx: &L1Context, block: u8) -> L1Fec {
        let encoder = XcchEncoder::new(ctx.clone(), 0, gsm_core::tdma_mapping::ccch_mapping(block), 0);
        L1Fec::new(0, Some(encoder), None, None)
    }

    /// RACH: uplink-only access-burst decoder.
    pub fn rach(ctx: &L1Context) -> L1Fec {
        let decoder = RachDecoder::new(ctx.clone(), 0, gsm_core::tdma_mapping::RACH_MAPPING);
        L1Fec::new(0, None, Some(decoder.clone()), Some(decoder))
    }

    /// FCCH: periodic frequency-correction burst generator.
    pub fn fcch(ctx: &L1Context) -> L1Fec {
        let encoder = FcchEncoder::new(ctx.clone());
        L1Fec::new(0, Some(encoder), None, None)
    }

    /// SCH: periodic synchronization burst generator.
    pub fn sch(ctx: &L1Context) -> L1Fec {
        let encoder = SchEncoder::new(ctx.clone());
        L1Fec::new(0, Some(encoder), None, None)
    }

    /// Attach the pair to the radio: the encoder transmits through it and
    /// the decoder is installed for this timeslot's receive dispatch.
    pub fn downstream(&self, radio: &Arc<dyn ArfcnRadio>) {
        if let Some(enc) = &self.encoder {
            enc.set_downstream(radio.clone());
        }
        if let Some(sink) = &self.decoder_sink {
            radio.install_decoder(self.tn, sink.clone());
        }
    }

    /// Attach the upper layer.
    pub fn upstream(&self, mux: &Arc<dyn SapMux>) {
        if let Some(enc) = &self.encoder {
            enc.set_upstream(mux.clone());
        }
        if let Some(dec) = &self.decoder {
            dec.set_upstream(mux.clone());
        }
    }

    pub fn open(&self) {
        if let Some(enc) = &self.encoder {
            enc.open();
        }
        if let Some(dec) = &self.decoder {
            dec.open();
        }
    }

    pub fn close(&self) {
        if let Some(enc) = &self.encoder {
            enc.close();
        }
        if let Some(dec) = &self.decoder {
            dec.close();
        }
    }

    /// Encode-only channels are always active; otherwise the decoder is the
    /// better indicator.
    pub fn active(&self) -> bool {
        match &self.decoder {
            Some(dec) => dec.active(),
            None => self.encoder.is_some(),
        }
    }

    /// Start the service threads of both halves.
    pub fn start(&self) {
        if let Some(enc) = &self.encoder {
            enc.start();
        }
        if let Some(dec) = &self.decoder {
            dec.start();
        }
    }

    /// Stop and join the service threads of both halves.
    pub fn stop(&self) {
        if let Some(enc) = &self.encoder {
            enc.stop();
        }
        if let Some(dec) = &self.decoder {
            dec.stop();
        }
    }

    pub fn encoder(&self) -> Option<&Arc<dyn EncoderHalf>> {
        self.encoder.as_ref()
    }

    pub fn decoder(&self) -> Option<&Arc<dyn DecoderHalf>> {
        self.decoder.as_ref()
    }
}

/// A full-rate traffic channel with its FACCH, keeping the concrete encoder
/// handle so speech frames can be queued.
pub struct TchFacchL1 {
    fec: L1Fec,
    encoder: Arc<TchFacchEncoder>,
    decoder: Arc<TchFacchDecoder>,
}

impl TchFacchL1 {
    pub fn new(ctx: &L1Context, tn: u8) -> TchFacchL1 {
        let encoder = TchFacchEncoder::new(ctx.clone(), tn);
        let decoder = TchFacchDecoder::new(ctx.clone(), tn);
        encoder.set_sibling(Arc::downgrade(&decoder) as Weak<dyn DecoderHalf>);
        let fec = L1Fec::new(
            tn,
            Some(encoder.clone() as Arc<dyn EncoderHalf>),
            Some(decoder.clone() as Arc<dyn DecoderHalf>),
            Some(decoder.clone() as Arc<dyn BurstSink>),
        );
        TchFacchL1 { fec, encoder, decoder }
    }

    pub fn fec(&self) -> &L1Fec {
        &self.fec
    }

    /// Queue a downlink speech frame.
    pub fn send_speech_frame(&self, frame: gsm_saps::VocoderFrame) {
        self.encoder.send_speech_frame(frame);
    }

    pub fn encoder(&self) -> &Arc<TchFacchEncoder> {
        &self.encoder
    }

    pub fn decoder(&self) -> &Arc<TchFacchDecoder> {
        &self.decoder
    }
}

/// A SACCH with the concrete halves exposed for physical-parameter
/// initialization at assignment time.
pub struct SacchL1 {
    fec: L1Fec,
    encoder: Arc<SacchEncoder>,
    decoder: Arc<SacchDecoder>,
}

impl SacchL1 {
    /// SACCH/C8 for an SDCCH subchannel.
    pub fn for_sdcch(ctx: &L1Context, tn: u8, subchannel: u8) -> SacchL1 {
        Self::build(
            ctx,
            tn,
            gsm_core::tdma_mapping::sacch8_mapping(subchannel, true),
            gsm_core::tdma_mapping::sacch8_mapping(subchannel, false),
        )
    }

    /// SACCH/TF for a full-rate traffic channel.
    pub fn for_tch(ctx: &L1Context, tn: u8) -> SacchL1 {
        Self::build(
            ctx,
            tn,
            gsm_core::tdma_mapping::sacch_tf_mapping(tn, true),
            gsm_core::tdma_mapping::sacch_tf_mapping(tn, false),
        )
    }

    fn build(
        ctx: &L1Context,
        tn: u8,
        dl: gsm_core::TdmaMapping,
        ul: gsm_core::TdmaMapping,
    ) -> SacchL1 {
        let decoder = SacchDecoder::new(ctx.clone(), tn, ul);
        let encoder = SacchEncoder::new(ctx.clone(), tn, dl, Arc::downgrade(&decoder));
        encoder.set_sibling(Arc::downgrade(&decoder) as Weak<dyn DecoderHalf>);
        let fec = L1Fec::new(
            tn,
            Some(encoder.clone() as Arc<dyn EncoderHalf>),
            Some(decoder.clone() as Arc<dyn DecoderHalf>),
            Some(decoder.clone() as Arc<dyn BurstSink>),
        );
        SacchL1 { fec, encoder, decoder }
    }

    pub fn fec(&self) -> &L1Fec {
        &self.fec
    }

    /// Seed the physical parameters from the access burst that triggered the
    /// assignment.
    pub fn set_phy(&self, rssi: f32, timing_error: f32) {
        self.decoder.set_phy(rssi, timing_error);
        self.encoder.set_phy_initial();
    }

    /// Seed the physical parameters from a pre-existing established channel.
    pub fn set_phy_from(&self, other: &SacchL1) {
        self.decoder.set_phy_from(&other.decoder);
        self.encoder.set_phy_from(&other.encoder);
    }

    pub fn encoder(&self) -> &Arc<SacchEncoder> {
        &self.encoder
    }

    pub fn decoder(&self) -> &Arc<SacchDecoder> {
        &self.decoder
    }
}
