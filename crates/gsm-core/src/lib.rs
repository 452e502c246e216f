//! Core utilities for GSM BlueStation
//!
//! This crate provides the fundamental types used across the L1 stack:
//! bit-array primitives, TDMA time and channel mappings, and radio bursts.

/// Git version string, set at compile time
pub const GIT_VERSION: &str = git_version::git_version!(fallback = "unknown");
/// Stack version followed by git version string, e.g., "0.1.0-aabbccdd"
pub const STACK_VERSION: &str = const_format::formatcp!("{}-{}", env!("CARGO_PKG_VERSION"), GIT_VERSION);

pub mod bits;
pub mod burst;
pub mod debug;
pub mod tdma_mapping;
pub mod tdma_time;

// Re-export commonly used items
pub use burst::{RxBurst, TxBurst};
pub use tdma_mapping::{TdmaMapping, TypeAndOffset};
pub use tdma_time::{GsmTime, HYPERFRAME};
