//! Peer addresses

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Network address of a datagram peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(SocketAddr);

impl Address {
    /// Wrap a socket address
    pub fn new(socket_address: SocketAddr) -> Self {
        Self(socket_address)
    }

    /// The IPv4 loopback address at `port`
    pub fn loopback(port: u16) -> Self {
        Self(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)))
    }

    /// Every local interface at `port`
    pub fn any(port: u16) -> Self {
        Self(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))
    }

    /// Port number
    pub fn port(&self) -> u16 {
        self.0.port()
    }

    /// The same host at another port
    pub fn with_port(mut self, port: u16) -> Self {
        self.0.set_port(port);
        self
    }

    /// Underlying socket address
    pub fn socket_address(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Address {
    fn from(socket_address: SocketAddr) -> Self {
        Self(socket_address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
