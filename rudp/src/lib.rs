//! rudp - Reliable UDP Connections
//!
//! High-level API for virtual connections with delivery feedback, loss
//! inference, and adaptive flow control over plain UDP.

pub use rudp_io as io;
pub use rudp_protocol as protocol;

// Re-export commonly used types
pub use rudp_io::{Address, SendPacer, Socket, Ticker};
pub use rudp_protocol::{
    ConnectionState, FlowControl, Mode, PacketHeader, ReliabilitySystem, ReliableConnection,
    SeqNumber,
};
