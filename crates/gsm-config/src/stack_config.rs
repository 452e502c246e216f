use std::sync::Arc;

use serde::Deserialize;

/// Frequency band of the cell. Determines the MS power-control table
/// (GSM 05.05 4.1.1). GSM400, GSM850 and EGSM900 share the low-band table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Band {
    Gsm400,
    Gsm850,
    Egsm900,
    Dcs1800,
    Pcs1900,
}

/// Cell identity and carrier parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CfgCellInfo {
    pub band: Band,
    /// C0 carrier number
    pub arfcn: u16,
    /// Network colour code, 3 bits
    pub ncc: u8,
    /// Base-station colour code, 3 bits. Also used as the TSC.
    pub bcc: u8,
}

impl CfgCellInfo {
    /// Base Station Identity Code: NCC followed by BCC, 6 bits.
    pub fn bsic(&self) -> u8 {
        (self.ncc << 3) | self.bcc
    }
}

/// Closed-loop MS power and timing-advance control parameters,
/// consumed by the SACCH encoder, plus the speech latency cap.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CfgRadioCtl {
    /// Target uplink RSSI in dB with respect to full scale
    pub rssi_target: f32,
    /// Clamp range for the ordered MS power, dBm
    pub ms_power_max: i32,
    pub ms_power_min: i32,
    /// Exponential smoothing for the power order, percent 0-100
    pub power_damping: u8,
    /// Maximum orderable timing advance, symbol intervals
    pub ta_max: u8,
    /// Exponential smoothing for the timing-advance order, percent 0-100
    pub ta_damping: u8,
    /// Cap on queued downlink speech frames; older frames are dropped
    pub max_speech_latency: usize,
}

impl Default for CfgRadioCtl {
    fn default() -> Self {
        Self {
            rssi_target: -50.0,
            ms_power_max: 33,
            ms_power_min: 5,
            power_damping: 75,
            ta_max: 63,
            ta_damping: 50,
            max_speech_latency: 2,
        }
    }
}

/// Channel lifecycle timers, milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CfgTimers {
    /// Initial-assignment timeout
    pub t3101_ms: u64,
    /// Radio-link-loss timeout
    pub t3109_ms: u64,
    /// Release delay before a closed channel may be reallocated
    pub t3111_ms: u64,
}

impl Default for CfgTimers {
    fn default() -> Self {
        Self { t3101_ms: 1000, t3109_ms: 19000, t3111_ms: 2000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    pub debug_log: Option<String>,

    /// Cell identity is REQUIRED - no default provided
    pub cell: CfgCellInfo,

    #[serde(default)]
    pub radioctl: CfgRadioCtl,

    #[serde(default)]
    pub timers: CfgTimers,
}

impl StackConfig {
    /// Validate that all required configuration fields are properly set.
    pub fn validate(&self) -> Result<(), String> {
        if self.cell.ncc > 7 {
            return Err(format!("cell.ncc {} out of range 0-7", self.cell.ncc));
        }
        if self.cell.bcc > 7 {
            return Err(format!("cell.bcc {} out of range 0-7", self.cell.bcc));
        }
        if self.radioctl.power_damping > 100 {
            return Err(format!("radioctl.power_damping {} out of range 0-100", self.radioctl.power_damping));
        }
        if self.radioctl.ta_damping > 100 {
            return Err(format!("radioctl.ta_damping {} out of range 0-100", self.radioctl.ta_damping));
        }
        if self.radioctl.ta_max > 63 {
            return Err(format!("radioctl.ta_max {} out of range 0-63", self.radioctl.ta_max));
        }
        if self.radioctl.ms_power_min > self.radioctl.ms_power_max {
            return Err("radioctl.ms_power_min exceeds ms_power_max".into());
        }
        Ok(())
    }
}

/// Global shared configuration handle. Immutable after construction and cheap
/// to clone into every channel.
#[derive(Clone)]
pub struct SharedConfig {
    cfg: Arc<StackConfig>,
}

impl SharedConfig {
    pub fn from_config(cfg: StackConfig) -> Self {
        // Check config for validity before returning the SharedConfig object
        if let Err(e) = cfg.validate() {
            panic!("Invalid stack configuration: {}", e);
        }
        Self { cfg: Arc::new(cfg) }
    }

    /// Access immutable config.
    pub fn config(&self) -> Arc<StackConfig> {
        Arc::clone(&self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cell() -> CfgCellInfo {
        CfgCellInfo { band: Band::Egsm900, arfcn: 51, ncc: 0, bcc: 7 }
    }

    #[test]
    fn test_bsic() {
        let mut cell = test_cell();
        assert_eq!(cell.bsic(), 7);
        cell.ncc = 5;
        cell.bcc = 2;
        assert_eq!(cell.bsic(), 0b101_010);
    }

    #[test]
    #[should_panic(expected = "Invalid stack configuration")]
    fn test_validate_rejects_bad_bcc() {
        let cfg = StackConfig {
            debug_log: None,
            cell: CfgCellInfo { bcc: 9, ..test_cell() },
            radioctl: CfgRadioCtl::default(),
            timers: CfgTimers::default(),
        };
        SharedConfig::from_config(cfg);
    }
}
