//! Reliable Connection
//!
//! Composes a [`ReliabilitySystem`] over a [`Connection`]: outbound
//! payloads gain a 12-byte `(seq, ack, ack_bits)` header behind the
//! protocol-id prefix, inbound datagrams have the header stripped and fed
//! back for ack processing. The connection still delivers whatever
//! arrives, in arrival order; reliability here means knowing what got
//! through, not re-sending what did not.

use crate::connection::{Connection, ConnectionError, ConnectionState, Mode};
use crate::packet::{PacketHeader, HEADER_SIZE};
use crate::reliability::ReliabilitySystem;
use bytes::BytesMut;
use rudp_io::Address;

/// Staging for one inbound datagram payload (header + application bytes).
const MAX_PACKET_SIZE: usize = 65_536;

/// Virtual connection with sequencing, acks, RTT, and loss accounting.
pub struct ReliableConnection {
    connection: Connection,
    reliability: ReliabilitySystem,
    scratch: Vec<u8>,
}

impl ReliableConnection {
    /// Create a stopped reliable connection.
    pub fn new(protocol_id: u32, timeout: f64) -> Self {
        ReliableConnection {
            connection: Connection::new(protocol_id, timeout),
            reliability: ReliabilitySystem::new(),
            scratch: vec![0u8; MAX_PACKET_SIZE],
        }
    }

    /// Bind the local port. Fails if already started.
    pub fn start(&mut self, port: u16) -> Result<(), ConnectionError> {
        self.connection.start(port)
    }

    /// Release the port and forget all reliability state. Idempotent.
    pub fn stop(&mut self) {
        self.connection.stop();
        self.reliability.reset();
    }

    /// Enter server mode and wait for a peer.
    pub fn listen(&mut self) {
        self.connection.listen();
        self.reliability.reset();
    }

    /// Enter client mode and lock the remote to `addr`.
    pub fn connect(&mut self, addr: Address) {
        self.connection.connect(addr);
        self.reliability.reset();
    }

    /// Send one payload, stamped with the current sequence and the ack
    /// state for the peer.
    ///
    /// Returns false when no remote is locked or the datagram could not
    /// be handed to the kernel; the sequence is only consumed on success.
    pub fn send_packet(&mut self, payload: &[u8]) -> bool {
        let (ack, ack_bits) = self.reliability.generate_ack_bits();
        let header = PacketHeader::new(self.reliability.local_sequence(), ack, ack_bits);

        let mut packet = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        header.write(&mut packet);
        packet.extend_from_slice(payload);

        if !self.connection.send(&packet) {
            return false;
        }
        self.reliability.packet_sent(payload.len());
        true
    }

    /// Receive the next application payload into `buf`.
    ///
    /// Every valid inbound packet feeds the reliability system (sequence
    /// recorded, acks processed) before its payload is surfaced. Packets
    /// shorter than the reliability header are dropped; header-only
    /// keepalives are consumed for their acks and the drain continues.
    /// Returns 0 once no payload-bearing packet is available.
    pub fn receive_packet(&mut self, buf: &mut [u8]) -> usize {
        loop {
            let size = self.connection.receive(&mut self.scratch);
            if size == 0 {
                return 0;
            }
            let Some(header) = PacketHeader::from_bytes(&self.scratch[..size]) else {
                tracing::trace!(size, "dropping packet shorter than reliability header");
                continue;
            };

            let payload_len = size - HEADER_SIZE;
            self.reliability.packet_received(header.seq, payload_len);
            self.reliability.process_ack(header.ack, header.ack_bits);

            if payload_len == 0 {
                continue;
            }
            let n = payload_len.min(buf.len());
            buf[..n].copy_from_slice(&self.scratch[HEADER_SIZE..HEADER_SIZE + n]);
            return n;
        }
    }

    /// Advance connection timers and reliability queues by `dt` seconds.
    ///
    /// If the connection dropped this tick (timeout), the reliability
    /// state is discarded so a future session starts clean.
    pub fn update(&mut self, dt: f64) {
        let was_established = self.connection.is_connected();
        self.connection.update(dt);
        if was_established && !self.connection.is_connected() {
            tracing::debug!("link lost; clearing reliability state");
            self.reliability.reset();
        }
        self.reliability.update(dt);
    }

    /// Reliability statistics: rtt, counters, bandwidth, acks this tick.
    pub fn reliability(&self) -> &ReliabilitySystem {
        &self.reliability
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn is_listening(&self) -> bool {
        self.connection.is_listening()
    }

    pub fn is_connecting(&self) -> bool {
        self.connection.is_connecting()
    }

    pub fn connect_failed(&self) -> bool {
        self.connection.connect_failed()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn mode(&self) -> Option<Mode> {
        self.connection.mode()
    }

    pub fn remote_addr(&self) -> Option<Address> {
        self.connection.remote_addr()
    }

    pub fn local_port(&self) -> Option<u16> {
        self.connection.local_port()
    }
}
