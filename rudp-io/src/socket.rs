//! UDP socket wrapper
//!
//! A thin non-blocking UDP socket bound to `0.0.0.0:port`. The socket is
//! oblivious to protocol ids and sequencing; it moves one datagram at a
//! time and never blocks.

use crate::addr::Address;
use socket2::{Domain, Protocol, Socket as RawSocket, Type};
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;

/// Socket configuration errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid socket address")]
    InvalidAddress,
}

/// Non-blocking UDP socket.
///
/// Opened once via [`Socket::open`]; the port is released when the value
/// is dropped. Send and receive move whole datagrams; a receive with no
/// datagram queued reports `None` instead of blocking.
pub struct Socket {
    inner: RawSocket,
    local: SocketAddrV4,
}

impl Socket {
    /// Bind a UDP socket to `0.0.0.0:port` and set it non-blocking.
    ///
    /// Port 0 asks the OS for an ephemeral port; [`Socket::local_addr`]
    /// reports the port actually bound.
    pub fn open(port: u16) -> Result<Self, SocketError> {
        let socket = RawSocket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&SocketAddr::V4(bind_addr).into())?;
        socket.set_nonblocking(true)?;

        let local = socket
            .local_addr()?
            .as_socket()
            .and_then(|a| match a {
                SocketAddr::V4(v4) => Some(v4),
                SocketAddr::V6(_) => None,
            })
            .ok_or(SocketError::InvalidAddress)?;

        Ok(Socket {
            inner: socket,
            local,
        })
    }

    /// The local address this socket is bound to.
    pub fn local_addr(&self) -> Address {
        self.local.into()
    }

    /// The local port this socket is bound to.
    pub fn local_port(&self) -> u16 {
        self.local.port()
    }

    /// Send one datagram to `dest`.
    ///
    /// There are no partial sends: the datagram either leaves whole or the
    /// call fails. A `WouldBlock` from the kernel surfaces as an error the
    /// caller treats as a transient send failure.
    pub fn send_to(&self, buf: &[u8], dest: Address) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, &dest.to_socket_addr().into())?)
    }

    /// Receive one datagram, if any is queued.
    ///
    /// Returns `Ok(None)` when the socket has nothing to deliver; never
    /// blocks.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, Address)>, SocketError> {
        // socket2 wants a MaybeUninit target; reuse the caller's buffer.
        use std::mem::MaybeUninit;
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };

        match self.inner.recv_from(uninit_buf) {
            Ok((n, addr)) => {
                let source = addr
                    .as_socket()
                    .and_then(|a| Address::try_from(a).ok())
                    .ok_or(SocketError::InvalidAddress)?;
                Ok(Some((n, source)))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(SocketError::Io(e)),
        }
    }
}
