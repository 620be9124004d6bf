//! Datagram sockets
//!
//! [`PacketSocket`] is the transport seam: a non-blocking read that reports
//! "no data" as `None`, and a write that reports whether the datagram left.
//! Transient failures are folded into those answers and retried by the
//! caller next frame. Only opening a socket or resolving a host can fail
//! with a [`NetError`].

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;

use thiserror::Error;

use super::address::Address;
use super::message::{Message, MAX_MESSAGE_SIZE};

/// Errors that can occur while setting up networking
#[derive(Debug, Error)]
pub enum NetError {
    /// Binding the local port failed
    #[error("failed to open socket on port {port}: {source}")]
    Open {
        /// Requested port
        port: u16,
        /// Underlying error
        source: io::Error,
    },

    /// The host name did not resolve to an address
    #[error("could not resolve '{0}'")]
    Resolve(String),

    /// Other I/O failure
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// Non-blocking datagram transport
pub trait PacketSocket {
    /// Read one pending datagram into `message`, returning its sender
    ///
    /// Returns `None` when no datagram is waiting. `message` is cleared first.
    fn read(&mut self, message: &mut Message) -> Option<Address>;

    /// Send one datagram; returns whether it was handed to the network
    fn write(&mut self, to: Address, bytes: &[u8]) -> bool;

    /// Address this socket is bound to
    fn local_address(&self) -> Address;
}

/// Errors that just mean "nothing to do this frame"
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::TimedOut
    )
}

/// UDP socket in non-blocking mode
#[derive(Debug)]
pub struct UdpSocket {
    socket: std::net::UdpSocket,
    local: Address,
    buffer: Vec<u8>,
}

impl UdpSocket {
    /// Bind every interface at `port` (0 picks a free port)
    pub fn open(port: u16) -> Result<Self, NetError> {
        let socket = std::net::UdpSocket::bind(Address::any(port).socket_address())
            .map_err(|source| NetError::Open { port, source })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| NetError::Open { port, source })?;
        let local = Address::new(socket.local_addr()?);
        log::info!("Opened UDP socket on {}", local);
        Ok(Self {
            socket,
            local,
            buffer: vec![0; MAX_MESSAGE_SIZE],
        })
    }
}

impl PacketSocket for UdpSocket {
    fn read(&mut self, message: &mut Message) -> Option<Address> {
        message.clear();
        loop {
            match self.socket.recv_from(&mut self.buffer) {
                Ok((size, from)) => {
                    if message.write_bytes(&self.buffer[..size]).is_err() {
                        log::warn!("Dropping oversized datagram ({} bytes) from {}", size, from);
                        continue;
                    }
                    return Some(Address::new(from));
                }
                // A reset on UDP reports an earlier send that bounced; keep draining
                Err(error) if error.kind() == ErrorKind::ConnectionReset => continue,
                Err(error) if is_transient(&error) => return None,
                Err(error) => {
                    log::warn!("UDP read failed: {}", error);
                    return None;
                }
            }
        }
    }

    fn write(&mut self, to: Address, bytes: &[u8]) -> bool {
        match self.socket.send_to(bytes, to.socket_address()) {
            Ok(sent) => sent == bytes.len(),
            Err(error) if is_transient(&error) => false,
            Err(error) => {
                log::warn!("UDP write to {} failed: {}", to, error);
                false
            }
        }
    }

    fn local_address(&self) -> Address {
        self.local
    }
}

impl Drop for UdpSocket {
    fn drop(&mut self) {
        log::info!("Closed UDP socket on {}", self.local);
    }
}

/// Resolve `host` (optionally `host:port`) to an address
///
/// IPv4 results are preferred. This may block on DNS; callers on the frame
/// loop run it on a background thread.
pub fn resolve(host: &str, default_port: u16) -> Result<Address, NetError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(NetError::Resolve(host.to_owned()));
    }
    if let Ok(address) = host.parse::<SocketAddr>() {
        return Ok(Address::new(address));
    }

    let candidates: Vec<SocketAddr> = if host.contains(':') {
        host.to_socket_addrs()
    } else {
        (host, default_port).to_socket_addrs()
    }
    .map_err(|_| NetError::Resolve(host.to_owned()))?
    .collect();

    candidates
        .iter()
        .find(|address| address.is_ipv4())
        .or_else(|| candidates.first())
        .map(|address| Address::new(*address))
        .ok_or_else(|| NetError::Resolve(host.to_owned()))
}

type Mailboxes = HashMap<Address, VecDeque<(Address, Vec<u8>)>>;

/// In-memory datagram network for tests and single-process games
///
/// Sockets bound on the same network deliver to each other instantly and in
/// order. Datagrams to unbound addresses are dropped, like UDP.
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    mailboxes: Rc<RefCell<Mailboxes>>,
}

impl LoopbackNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a socket at the loopback address with `port`
    pub fn bind(&self, port: u16) -> LoopbackSocket {
        let local = Address::loopback(port);
        self.mailboxes.borrow_mut().entry(local).or_default();
        LoopbackSocket {
            network: self.clone(),
            local,
        }
    }

    /// Datagrams waiting for `address`
    pub fn pending(&self, address: Address) -> usize {
        self.mailboxes.borrow().get(&address).map_or(0, VecDeque::len)
    }

    /// Discard every queued datagram
    pub fn drop_all(&self) {
        for queue in self.mailboxes.borrow_mut().values_mut() {
            queue.clear();
        }
    }
}

/// Socket on a [`LoopbackNetwork`]
#[derive(Debug)]
pub struct LoopbackSocket {
    network: LoopbackNetwork,
    local: Address,
}

impl PacketSocket for LoopbackSocket {
    fn read(&mut self, message: &mut Message) -> Option<Address> {
        message.clear();
        let (from, bytes) = self
            .network
            .mailboxes
            .borrow_mut()
            .get_mut(&self.local)?
            .pop_front()?;
        message.write_bytes(&bytes).ok()?;
        Some(from)
    }

    fn write(&mut self, to: Address, bytes: &[u8]) -> bool {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return false;
        }
        if let Some(queue) = self.network.mailboxes.borrow_mut().get_mut(&to) {
            queue.push_back((self.local, bytes.to_vec()));
        }
        true
    }

    fn local_address(&self) -> Address {
        self.local
    }
}

impl Drop for LoopbackSocket {
    fn drop(&mut self) {
        self.network.mailboxes.borrow_mut().remove(&self.local);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_delivery_in_order() {
        let network = LoopbackNetwork::new();
        let mut a = network.bind(1);
        let mut b = network.bind(2);

        assert!(a.write(b.local_address(), b"one"));
        assert!(a.write(b.local_address(), b"two"));
        assert_eq!(network.pending(b.local_address()), 2);

        let mut message = Message::new();
        assert_eq!(b.read(&mut message), Some(a.local_address()));
        assert_eq!(message.as_bytes(), b"one");
        assert_eq!(b.read(&mut message), Some(a.local_address()));
        assert_eq!(message.as_bytes(), b"two");
        assert_eq!(b.read(&mut message), None);
        assert!(message.is_empty());
    }

    #[test]
    fn test_loopback_unbound_address_drops() {
        let network = LoopbackNetwork::new();
        let mut a = network.bind(1);
        assert!(a.write(Address::loopback(9), b"lost"));
        assert_eq!(network.pending(Address::loopback(9)), 0);
    }

    #[test]
    fn test_udp_roundtrip_on_loopback() {
        let mut server = UdpSocket::open(0).unwrap();
        let mut client = UdpSocket::open(0).unwrap();
        let server_address = Address::loopback(server.local_address().port());

        let mut message = Message::new();
        assert_eq!(server.read(&mut message), None);

        assert!(client.write(server_address, b"info\0"));
        let mut from = None;
        for _ in 0..200 {
            from = server.read(&mut message);
            if from.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(from.map(|a| a.port()), Some(client.local_address().port()));
        assert_eq!(message.as_bytes(), b"info\0");
    }

    #[test]
    fn test_resolve_literal_addresses() {
        assert_eq!(resolve("127.0.0.1:4000", 1).unwrap(), Address::loopback(4000));
        assert_eq!(resolve("127.0.0.1", 28100).unwrap(), Address::loopback(28100));
        assert!(matches!(resolve("", 1), Err(NetError::Resolve(_))));
    }
}
