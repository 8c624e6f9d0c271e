//! Endpoint Addresses
//!
//! An `Address` identifies one UDP endpoint: an IPv4 quad packed into a
//! 32-bit value plus a 16-bit port. Connections compare addresses to gate
//! inbound datagrams against the locked remote peer.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

/// IPv4 endpoint identity: packed address plus port.
///
/// Equality and ordering cover the full 48 bits, so an `Address` can be
/// used directly as a map key or a locked-peer comparand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    addr: u32,
    port: u16,
}

impl Address {
    /// Create an address from four octets and a port.
    pub fn new(a: u8, b: u8, c: u8, d: u8, port: u16) -> Self {
        Address {
            addr: u32::from_be_bytes([a, b, c, d]),
            port,
        }
    }

    /// Create an address from an `Ipv4Addr` and a port.
    pub fn from_ipv4(ip: Ipv4Addr, port: u16) -> Self {
        Address {
            addr: u32::from(ip),
            port,
        }
    }

    /// The packed 32-bit address value.
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.addr
    }

    /// The four address octets, most significant first.
    #[inline]
    pub fn octets(self) -> [u8; 4] {
        self.addr.to_be_bytes()
    }

    /// The port number.
    #[inline]
    pub fn port(self) -> u16 {
        self.port
    }

    /// The address as a standard socket address.
    pub fn to_socket_addr(self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(self.addr), self.port))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets();
        write!(f, "{}.{}.{}.{}:{}", a, b, c, d, self.port)
    }
}

impl From<SocketAddrV4> for Address {
    fn from(addr: SocketAddrV4) -> Self {
        Address::from_ipv4(*addr.ip(), addr.port())
    }
}

impl TryFrom<SocketAddr> for Address {
    type Error = ();

    /// Fails for IPv6 socket addresses; rudp endpoints are IPv4-only.
    fn try_from(addr: SocketAddr) -> Result<Self, ()> {
        match addr {
            SocketAddr::V4(v4) => Ok(v4.into()),
            SocketAddr::V6(_) => Err(()),
        }
    }
}

impl FromStr for Address {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v4: SocketAddrV4 = s.parse()?;
        Ok(v4.into())
    }
}
