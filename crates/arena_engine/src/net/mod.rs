//! Datagram networking
//!
//! - [`Message`]: bounded byte buffer with checked little-endian reads
//! - [`Channel`]: per-peer framing, netport demultiplexing and timeout
//! - [`PacketSocket`]: non-blocking datagram transport, backed by UDP or an
//!   in-memory loopback

pub mod address;
pub mod channel;
pub mod message;
pub mod socket;

pub use address::Address;
pub use channel::{generate_netport, read_header, Channel, CHANNEL_PREFIX, CHANNEL_TIMEOUT};
pub use message::{BlockReservation, Message, MessageError, MAX_MESSAGE_SIZE};
pub use socket::{resolve, LoopbackNetwork, LoopbackSocket, NetError, PacketSocket, UdpSocket};
