//! Configuration for the GSM BlueStation L1 stack.

pub mod stack_config;
pub mod toml_config;

pub use stack_config::{Band, CfgCellInfo, CfgRadioCtl, CfgTimers, SharedConfig, StackConfig};
