//! rudp CLI Library
//!
//! Shared functionality for the rudp file-transfer tools: configuration,
//! statistics formatting, and the transfer framing (metadata, data
//! chunks, CRC32 trailer).

pub mod config;
pub mod stats;
pub mod transfer;

pub use config::{ConfigError, TransferConfig};
pub use stats::{format_bandwidth, format_bytes, format_rtt, reliability_summary};
pub use transfer::{FileChunker, Frame};

/// Protocol id agreed by both transfer tools; foreign datagrams sharing
/// the port are dropped on this value.
pub const PROTOCOL_ID: u32 = 0x1122_3344;

/// Update-loop cadence for both tools.
pub const TICK_RATE_HZ: u32 = 30;
