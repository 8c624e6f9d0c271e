//! rudp Protocol Core
//!
//! This crate implements a reliability and flow-control layer on top of an
//! unordered, unreliable datagram transport: per-packet sequencing with
//! acknowledgement bitfields, RTT estimation and loss accounting, a
//! virtual-connection state machine with protocol-id and peer gating, and
//! an adaptive send-rate governor.
//!
//! The layer reports delivery and loss; it does not reorder, buffer, or
//! retransmit payloads.

pub mod connection;
pub mod flow;
pub mod packet;
pub mod reliability;
pub mod reliable;
pub mod sequence;

pub use connection::{Connection, ConnectionError, ConnectionState, Mode, DEFAULT_TIMEOUT};
pub use flow::FlowControl;
pub use packet::{PacketHeader, HEADER_SIZE, PROTOCOL_ID_SIZE};
pub use reliability::{PacketInfo, ReliabilitySystem};
pub use reliable::ReliableConnection;
pub use sequence::SeqNumber;
