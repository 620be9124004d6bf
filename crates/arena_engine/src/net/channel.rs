//! Per-peer message channel
//!
//! Every datagram sent through a channel starts with [`CHANNEL_PREFIX`] and
//! the sender's netport. Connectionless traffic is plain ASCII and can never
//! start with the prefix, so the first four bytes tell the two apart. The
//! netport lets several peers behind one address share a server socket.

use std::time::{SystemTime, UNIX_EPOCH};

use super::address::Address;
use super::message::{Message, MessageError, MAX_MESSAGE_SIZE};
use super::socket::PacketSocket;

/// Marker at the start of every channel datagram
pub const CHANNEL_PREFIX: u32 = 0xFFFF_FFFF;

/// Seconds of silence after which a peer is dropped
pub const CHANNEL_TIMEOUT: f64 = 10.0;

/// Size of the prefix and netport header
pub const HEADER_SIZE: usize = 6;

/// Pick a netport from the high-resolution clock
pub fn generate_netport() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.subsec_nanos());
    let mixed = nanos ^ (nanos >> 16);
    // Zero is reserved for "no netport"
    (mixed as u16).max(1)
}

/// Split a datagram into its channel header
///
/// Returns the sender's netport and leaves the read cursor after the header
/// when the datagram carries the channel prefix; otherwise returns `None`
/// with the cursor untouched so the datagram can be read as a connectionless
/// command.
pub fn read_header(packet: &mut Message) -> Result<Option<u16>, MessageError> {
    if packet.peek_u32() != Some(CHANNEL_PREFIX) {
        return Ok(None);
    }
    packet.read_u32()?;
    packet.read_u16().map(Some)
}

/// Sequencing wrapper for one remote peer
#[derive(Debug, Clone)]
pub struct Channel {
    address: Address,
    netport: u16,
    message: Message,
    last_sent: f64,
    last_received: f64,
}

impl Channel {
    /// Open a channel to `address`, identifying this side with `netport`
    pub fn new(address: Address, netport: u16, now: f64) -> Self {
        Self {
            address,
            netport,
            message: Message::with_capacity(MAX_MESSAGE_SIZE - HEADER_SIZE),
            last_sent: now,
            last_received: now,
        }
    }

    /// Remote address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Netport written into every outgoing datagram
    pub fn netport(&self) -> u16 {
        self.netport
    }

    /// Outgoing payload accumulated since the last transmit
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Outgoing payload for writing
    pub fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    /// Time of the last transmit
    pub fn last_sent(&self) -> f64 {
        self.last_sent
    }

    /// Time of the last processed datagram
    pub fn last_received(&self) -> f64 {
        self.last_received
    }

    /// Send the accumulated payload and clear it
    ///
    /// Returns whether a datagram went out. An empty payload sends nothing.
    pub fn transmit(&mut self, socket: &mut dyn PacketSocket, now: f64) -> Result<bool, MessageError> {
        if self.message.is_empty() {
            return Ok(false);
        }

        let mut packet = Message::with_capacity(HEADER_SIZE + self.message.len());
        packet.write_u32(CHANNEL_PREFIX)?;
        packet.write_u16(self.netport)?;
        packet.write_bytes(self.message.as_bytes())?;
        self.message.clear();

        let sent = socket.write(self.address, packet.as_bytes());
        if sent {
            self.last_sent = now;
        } else {
            log::debug!("Datagram to {} was not sent", self.address);
        }
        Ok(sent)
    }

    /// Note that a datagram from the peer arrived at `now`
    pub fn process(&mut self, now: f64) {
        self.last_received = self.last_received.max(now);
    }

    /// Whether the peer has been silent for [`CHANNEL_TIMEOUT`] or longer
    pub fn timed_out(&self, now: f64) -> bool {
        now - self.last_received >= CHANNEL_TIMEOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::socket::LoopbackNetwork;

    #[test]
    fn test_transmit_frames_payload() {
        let network = LoopbackNetwork::new();
        let mut sender = network.bind(1000);
        let mut receiver = network.bind(2000);

        let mut channel = Channel::new(Address::loopback(2000), 0xBEEF, 0.0);
        channel.message_mut().write_u8(42).unwrap();
        assert!(channel.transmit(&mut sender, 1.0).unwrap());
        assert!(channel.message().is_empty());
        assert_eq!(channel.last_sent(), 1.0);

        let mut packet = Message::new();
        let from = receiver.read(&mut packet).unwrap();
        assert_eq!(from, Address::loopback(1000));
        assert_eq!(read_header(&mut packet).unwrap(), Some(0xBEEF));
        assert_eq!(packet.read_u8().unwrap(), 42);
    }

    #[test]
    fn test_empty_payload_is_not_sent() {
        let network = LoopbackNetwork::new();
        let mut sender = network.bind(1000);
        let mut channel = Channel::new(Address::loopback(2000), 1, 0.0);
        assert!(!channel.transmit(&mut sender, 1.0).unwrap());
    }

    #[test]
    fn test_connectionless_packet_has_no_header() {
        let mut packet = Message::from_bytes(b"info\0").unwrap();
        assert_eq!(read_header(&mut packet).unwrap(), None);
        assert_eq!(packet.read_position(), 0);
    }

    #[test]
    fn test_timeout_boundary() {
        let mut channel = Channel::new(Address::loopback(2000), 1, 0.0);
        assert!(!channel.timed_out(9.99));
        assert!(channel.timed_out(10.0));

        channel.process(5.0);
        assert!(!channel.timed_out(10.0));
        assert!(channel.timed_out(15.0));
    }

    #[test]
    fn test_generated_netport_is_nonzero() {
        assert_ne!(generate_netport(), 0);
    }
}
