//! Virtual Connection State Machine
//!
//! A virtual connection is a (local port, remote address) pair plus
//! liveness state on top of connectionless datagrams, kept alive by the
//! steady flow of packets. Inbound datagrams pass two gates before they
//! touch any state: the 4-byte protocol-id prefix must match, and once a
//! peer is locked the source address must equal it.

use crate::packet::PROTOCOL_ID_SIZE;
use bytes::{BufMut, BytesMut};
use rudp_io::{Address, Socket, SocketError};
use thiserror::Error;

/// Largest datagram the receive path will stage.
const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Seconds of silence after which a peer is considered gone, unless the
/// caller picks its own threshold.
pub const DEFAULT_TIMEOUT: f64 = 10.0;

/// Connection role; affects how the remote address is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Locks the remote at `connect` time.
    Client,
    /// Learns the remote from the first valid inbound datagram.
    Server,
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; the socket may still be bound.
    Disconnected,
    /// Server waiting for a first valid packet to lock onto.
    Listening,
    /// Client waiting for a first valid packet from its locked remote.
    Connecting,
    /// Both sides exchanging valid packets.
    Connected,
    /// A connect attempt or an established session timed out.
    ConnectFailed,
}

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("connection already started")]
    AlreadyStarted,

    #[error("socket error: {0}")]
    Socket(#[from] SocketError),
}

/// Virtual connection over one exclusively-owned UDP socket.
///
/// Owns the socket for its lifetime; `start`/`stop` scope the port bind.
/// Payloads are opaque: this layer only adds the protocol-id prefix on
/// send and strips it (after gating) on receive.
pub struct Connection {
    protocol_id: u32,
    timeout: f64,
    mode: Option<Mode>,
    state: ConnectionState,
    socket: Option<Socket>,
    remote: Option<Address>,
    timeout_accumulator: f64,
    scratch: Vec<u8>,
}

impl Connection {
    /// Create a stopped connection.
    ///
    /// `protocol_id` gates inbound traffic; `timeout` is the seconds of
    /// silence after which the peer is considered gone
    /// ([`DEFAULT_TIMEOUT`] for the conventional value).
    pub fn new(protocol_id: u32, timeout: f64) -> Self {
        Connection {
            protocol_id,
            timeout,
            mode: None,
            state: ConnectionState::Disconnected,
            socket: None,
            remote: None,
            timeout_accumulator: 0.0,
            scratch: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    /// Bind the local port. Fails if already started.
    pub fn start(&mut self, port: u16) -> Result<(), ConnectionError> {
        if self.socket.is_some() {
            return Err(ConnectionError::AlreadyStarted);
        }
        let socket = Socket::open(port)?;
        tracing::info!(port = socket.local_port(), "connection started");
        self.socket = Some(socket);
        Ok(())
    }

    /// Release the port and return to `Disconnected`. Idempotent.
    pub fn stop(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!("connection stopped");
        }
        self.clear_session();
    }

    /// Enter server mode and wait for a peer.
    pub fn listen(&mut self) {
        tracing::info!("listening for connection");
        self.clear_session();
        self.mode = Some(Mode::Server);
        self.state = ConnectionState::Listening;
    }

    /// Enter client mode and lock the remote to `addr`.
    pub fn connect(&mut self, addr: Address) {
        tracing::info!(remote = %addr, "connecting");
        self.clear_session();
        self.mode = Some(Mode::Client);
        self.state = ConnectionState::Connecting;
        self.remote = Some(addr);
    }

    /// Advance the timeout accumulator by `dt` seconds.
    ///
    /// A connect attempt that times out fails; an established session
    /// that times out re-listens on a server and fails on a client.
    pub fn update(&mut self, dt: f64) {
        self.timeout_accumulator += dt;
        if self.timeout_accumulator <= self.timeout {
            return;
        }

        match self.state {
            ConnectionState::Connecting => {
                tracing::warn!("connect timed out");
                self.fail_session();
            }
            ConnectionState::Connected => {
                tracing::warn!("connection timed out");
                if self.mode == Some(Mode::Server) {
                    self.listen();
                } else {
                    self.fail_session();
                }
            }
            _ => {}
        }
    }

    /// Send one payload to the locked remote.
    ///
    /// Prepends the protocol id. Returns false (dropping silently) when
    /// no remote is locked or the kernel refuses the datagram; transient
    /// send failures are logged, never propagated.
    pub fn send(&mut self, payload: &[u8]) -> bool {
        let (Some(socket), Some(remote)) = (self.socket.as_ref(), self.remote) else {
            return false;
        };

        let mut datagram = BytesMut::with_capacity(PROTOCOL_ID_SIZE + payload.len());
        datagram.put_u32(self.protocol_id);
        datagram.put_slice(payload);

        match socket.send_to(&datagram, remote) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(remote = %remote, error = %e, "datagram send failed");
                false
            }
        }
    }

    /// Receive the next valid payload into `buf`.
    ///
    /// Drains queued datagrams, silently discarding those that fail the
    /// protocol-id or peer gate, and returns the payload length of the
    /// first valid one, or 0 once the socket is empty. Any valid packet
    /// resets the timeout accumulator; the first one seen while listening
    /// (or connecting) completes the connection.
    pub fn receive(&mut self, buf: &mut [u8]) -> usize {
        let Some(socket) = self.socket.as_ref() else {
            return 0;
        };

        loop {
            let (size, sender) = match socket.recv_from(&mut self.scratch) {
                Ok(Some(received)) => received,
                Ok(None) => return 0,
                Err(e) => {
                    tracing::warn!(error = %e, "datagram receive failed");
                    return 0;
                }
            };

            if size < PROTOCOL_ID_SIZE {
                tracing::trace!(size, "dropping runt datagram");
                continue;
            }
            let prefix = u32::from_be_bytes([
                self.scratch[0],
                self.scratch[1],
                self.scratch[2],
                self.scratch[3],
            ]);
            if prefix != self.protocol_id {
                tracing::trace!(prefix, "dropping datagram with foreign protocol id");
                continue;
            }

            match self.state {
                ConnectionState::Listening => {
                    tracing::info!(remote = %sender, "server accepted connection");
                    self.state = ConnectionState::Connected;
                    self.remote = Some(sender);
                }
                _ if self.remote == Some(sender) => {
                    if self.state == ConnectionState::Connecting {
                        tracing::info!(remote = %sender, "client completed connection");
                        self.state = ConnectionState::Connected;
                    }
                }
                _ => {
                    tracing::trace!(sender = %sender, "dropping datagram from wrong peer");
                    continue;
                }
            }

            self.timeout_accumulator = 0.0;

            let payload_len = (size - PROTOCOL_ID_SIZE).min(buf.len());
            buf[..payload_len]
                .copy_from_slice(&self.scratch[PROTOCOL_ID_SIZE..PROTOCOL_ID_SIZE + payload_len]);
            return payload_len;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_listening(&self) -> bool {
        self.state == ConnectionState::Listening
    }

    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    pub fn connect_failed(&self) -> bool {
        self.state == ConnectionState::ConnectFailed
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// The locked remote, if any.
    pub fn remote_addr(&self) -> Option<Address> {
        self.remote
    }

    /// The bound local address, if started.
    pub fn local_addr(&self) -> Option<Address> {
        self.socket.as_ref().map(|s| s.local_addr())
    }

    /// The bound local port, if started.
    pub fn local_port(&self) -> Option<u16> {
        self.socket.as_ref().map(|s| s.local_port())
    }

    fn clear_session(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.remote = None;
        self.timeout_accumulator = 0.0;
    }

    fn fail_session(&mut self) {
        self.clear_session();
        self.state = ConnectionState::ConnectFailed;
    }
}
