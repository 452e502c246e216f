use gsm_core::GsmTime;

use crate::l2frame::L2Frame;
use crate::vocoder::VocoderFrame;

/// Upstream sink for decoded traffic: the L2 multiplexer and the vocoder
/// path. One implementation is attached per logical channel.
///
/// All methods are called from L1 threads and must not block for long;
/// in particular the RACH path runs on its own service thread precisely so
/// that a slow implementation here cannot stall the radio receive thread.
pub trait SapMux: Send + Sync {
    /// A decoded control-channel frame (XCCH, BCCH, CCCH, RACH).
    fn write_low_side(&self, frame: L2Frame, when: GsmTime, rssi: f32, ta: u8, fer: f32);

    /// SACCH variant, carrying the handset's reported power and timing
    /// advance parsed from the physical header.
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
        // Default: fold into the plain indication.
        let _ = (actual_ms_power, actual_ms_timing);
        self.write_low_side(frame, when, rssi, ta, fer);
    }

    /// A decoded (or concealed) speech frame.
    fn write_low_side_tch(&self, frame: VocoderFrame, when: GsmTime, rssi: f32, ta: u8, fer: f32);

    /// Next transmit opportunity for this channel, so frame submission can be
    /// scheduled. Signalled after every burst-time advance.
    fn signal_next_wtime(&self, when: GsmTime) {
        let _ = when;
    }
}
