//! Reliability Header Serialization
//!
//! Every rudp datagram carries a 4-byte protocol-id prefix followed by a
//! 12-byte reliability header: three 32-bit big-endian fields `(seq, ack,
//! ack_bits)`. The payload after the header is opaque to the core.
//!
//! ```text
//!  0        4       8       12      16        N
//!  +--------+-------+-------+--------+--------+
//!  | protoID|  seq  |  ack  |ack_bits| payload|
//!  +--------+-------+-------+--------+--------+
//! ```

use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, BytesMut};

/// Size of the reliability header in bytes (3 fields x 4 bytes).
pub const HEADER_SIZE: usize = 12;

/// Size of the protocol-id prefix in bytes.
pub const PROTOCOL_ID_SIZE: usize = 4;

/// Reliability header stamped on every packet.
///
/// `seq` is this packet's sequence; `ack` is the most recent sequence
/// observed from the peer; bit `i` of `ack_bits` means `ack - 1 - i` has
/// also been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub seq: SeqNumber,
    pub ack: SeqNumber,
    pub ack_bits: u32,
}

impl PacketHeader {
    pub fn new(seq: SeqNumber, ack: SeqNumber, ack_bits: u32) -> Self {
        PacketHeader { seq, ack, ack_bits }
    }

    /// Append the 12 header bytes, big-endian, to `buf`.
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u32(self.seq.as_raw());
        buf.put_u32(self.ack.as_raw());
        buf.put_u32(self.ack_bits);
    }

    /// Parse a header from the front of `bytes`.
    ///
    /// Returns `None` when fewer than [`HEADER_SIZE`] bytes are present;
    /// short packets are dropped by the caller.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }

        let mut buf = bytes;
        Some(PacketHeader {
            seq: SeqNumber::new(buf.get_u32()),
            ack: SeqNumber::new(buf.get_u32()),
            ack_bits: buf.get_u32(),
        })
    }
}
