use std::sync::Arc;

use gsm_core::{RxBurst, TxBurst};

/// Receive side of a logical channel, registered with the radio for one
/// (timeslot, channel-type) combination. The radio's receive thread dispatches
/// every uplink burst for that slot here, in burst-time order.
pub trait BurstSink: Send + Sync {
    fn write_low_side(&self, burst: &RxBurst);
}

/// Downstream radio interface for one carrier.
///
/// `write_high_side` accepts a stamped burst for on-air transmission at the
/// embedded time; submissions from one encoder arrive in time order and the
/// radio serializes across timeslots by burst time.
pub trait ArfcnRadio: Send + Sync {
    fn write_high_side(&self, burst: TxBurst);
    fn install_decoder(&self, tn: u8, decoder: Arc<dyn BurstSink>);
    fn arfcn(&self) -> u16;
}
