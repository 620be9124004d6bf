//! Bounded byte buffer with little-endian encoding
//!
//! A [`Message`] has a write end (the written length) and an independent
//! read cursor. Every read is checked against the written length and fails
//! with [`MessageError`] instead of producing a sentinel value.
//!
//! Length-prefixed sub-blocks are written in two phases: [`Message::reserve_block`]
//! leaves room for a `u16` length, the caller writes the contents, and
//! [`Message::commit_block`] patches the length in.

use thiserror::Error;

use crate::foundation::math::Vec2;

/// Largest datagram payload a message holds
pub const MAX_MESSAGE_SIZE: usize = 8192;

/// Errors from encoding or decoding a [`Message`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Read past the written length
    #[error("read of {needed} bytes with only {remaining} remaining")]
    Underrun {
        /// Bytes the read wanted
        needed: usize,
        /// Bytes left to read
        remaining: usize,
    },

    /// Write past the capacity
    #[error("write of {needed} bytes with only {remaining} bytes free")]
    Overflow {
        /// Bytes the write wanted
        needed: usize,
        /// Bytes left before the capacity
        remaining: usize,
    },

    /// String ran to the end of the message without a NUL
    #[error("string is missing its NUL terminator")]
    UnterminatedString,

    /// String bytes were not UTF-8, or a written string held a NUL
    #[error("string is not valid text")]
    InvalidString,

    /// Block contents exceed what the length prefix can describe
    #[error("block of {0} bytes is too large")]
    BlockTooLarge(usize),

    /// Reservation no longer fits the written data (the message was cleared)
    #[error("block reservation at offset {0} is no longer valid")]
    StaleReservation(usize),
}

/// Placeholder for a block length, returned by [`Message::reserve_block`]
#[derive(Debug)]
#[must_use = "a reserved block must be committed"]
pub struct BlockReservation {
    offset: usize,
}

/// Byte buffer with a write end and a read cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    data: Vec<u8>,
    capacity: usize,
    read_cursor: usize,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// Create an empty message of [`MAX_MESSAGE_SIZE`] capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_MESSAGE_SIZE)
    }

    /// Create an empty message with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            read_cursor: 0,
        }
    }

    /// Create a message holding a copy of `bytes`, ready for reading
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let mut message = Self::new();
        message.write_bytes(bytes)?;
        Ok(message)
    }

    /// Written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of written bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of bytes the message holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_cursor
    }

    /// Position of the read cursor
    pub fn read_position(&self) -> usize {
        self.read_cursor
    }

    /// Drop all written data and reset the read cursor
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_cursor = 0;
    }

    /// Drop everything written after the first `len` bytes
    ///
    /// Used to undo a partially written entry after a failed write.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.read_cursor = self.read_cursor.min(self.data.len());
    }

    /// Move the read cursor back to the start
    pub fn rewind(&mut self) {
        self.read_cursor = 0;
    }

    // Writing

    /// Append raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), MessageError> {
        let remaining = self.capacity - self.data.len();
        if bytes.len() > remaining {
            return Err(MessageError::Overflow {
                needed: bytes.len(),
                remaining,
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a byte
    pub fn write_u8(&mut self, value: u8) -> Result<(), MessageError> {
        self.write_bytes(&[value])
    }

    /// Append a little-endian `u16`
    pub fn write_u16(&mut self, value: u16) -> Result<(), MessageError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian `u32`
    pub fn write_u32(&mut self, value: u32) -> Result<(), MessageError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian `i32`
    pub fn write_i32(&mut self, value: i32) -> Result<(), MessageError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a little-endian IEEE-754 `f32`
    pub fn write_f32(&mut self, value: f32) -> Result<(), MessageError> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Append a vector as two floats
    pub fn write_vec2(&mut self, value: Vec2) -> Result<(), MessageError> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)
    }

    /// Append a NUL-terminated string
    pub fn write_string(&mut self, value: &str) -> Result<(), MessageError> {
        if value.as_bytes().contains(&0) {
            return Err(MessageError::InvalidString);
        }
        let needed = value.len() + 1;
        let remaining = self.capacity - self.data.len();
        if needed > remaining {
            return Err(MessageError::Overflow { needed, remaining });
        }
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        Ok(())
    }

    /// Leave room for a `u16` block length
    pub fn reserve_block(&mut self) -> Result<BlockReservation, MessageError> {
        let offset = self.data.len();
        self.write_u16(0)?;
        Ok(BlockReservation { offset })
    }

    /// Patch the length of everything written since `reservation`
    pub fn commit_block(&mut self, reservation: BlockReservation) -> Result<(), MessageError> {
        let start = reservation.offset + 2;
        if start > self.data.len() {
            return Err(MessageError::StaleReservation(reservation.offset));
        }
        let length = self.data.len() - start;
        let encoded = u16::try_from(length).map_err(|_| MessageError::BlockTooLarge(length))?;
        self.data[reservation.offset..start].copy_from_slice(&encoded.to_le_bytes());
        Ok(())
    }

    /// Append a block holding the written bytes of `block`
    pub fn write_block(&mut self, block: &Message) -> Result<(), MessageError> {
        let length = u16::try_from(block.len()).map_err(|_| MessageError::BlockTooLarge(block.len()))?;
        self.write_u16(length)?;
        self.write_bytes(block.as_bytes())
    }

    // Reading

    /// Consume `count` raw bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<&[u8], MessageError> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(MessageError::Underrun {
                needed: count,
                remaining,
            });
        }
        let start = self.read_cursor;
        self.read_cursor += count;
        Ok(&self.data[start..self.read_cursor])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], MessageError> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.read_bytes(N)?);
        Ok(bytes)
    }

    /// Consume a byte
    pub fn read_u8(&mut self) -> Result<u8, MessageError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Consume a little-endian `u16`
    pub fn read_u16(&mut self) -> Result<u16, MessageError> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Consume a little-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32, MessageError> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Consume a little-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32, MessageError> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Consume a little-endian `f32`
    pub fn read_f32(&mut self) -> Result<f32, MessageError> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Consume two floats as a vector
    pub fn read_vec2(&mut self) -> Result<Vec2, MessageError> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        Ok(Vec2::new(x, y))
    }

    /// Consume a NUL-terminated string
    pub fn read_string(&mut self) -> Result<String, MessageError> {
        let unread = &self.data[self.read_cursor..];
        let end = unread
            .iter()
            .position(|&b| b == 0)
            .ok_or(MessageError::UnterminatedString)?;
        let text = std::str::from_utf8(&unread[..end])
            .map_err(|_| MessageError::InvalidString)?
            .to_owned();
        self.read_cursor += end + 1;
        Ok(text)
    }

    /// Consume a length-prefixed block as its own message
    pub fn read_block(&mut self) -> Result<Message, MessageError> {
        let length = usize::from(self.read_u16()?);
        let bytes = self.read_bytes(length)?;
        let mut block = Message::with_capacity(length);
        block.data.extend_from_slice(bytes);
        Ok(block)
    }

    /// Peek at the next `u32` without consuming it
    pub fn peek_u32(&self) -> Option<u32> {
        let bytes = self.data.get(self.read_cursor..self.read_cursor + 4)?;
        let mut array = [0; 4];
        array.copy_from_slice(bytes);
        Some(u32::from_le_bytes(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut message = Message::new();
        message.write_u16(0x0102).unwrap();
        message.write_u32(0x0304_0506).unwrap();
        message.write_i32(-1).unwrap();
        assert_eq!(
            message.as_bytes(),
            &[0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_mixed_values_read_back_in_order() {
        let mut message = Message::new();
        message.write_u8(7).unwrap();
        message.write_string("tank").unwrap();
        message.write_vec2(Vec2::new(1.5, -2.25)).unwrap();
        message.write_i32(-42).unwrap();

        assert_eq!(message.read_u8().unwrap(), 7);
        assert_eq!(message.read_string().unwrap(), "tank");
        assert_eq!(message.read_vec2().unwrap(), Vec2::new(1.5, -2.25));
        assert_eq!(message.read_i32().unwrap(), -42);
        assert_eq!(message.remaining(), 0);
    }

    #[test]
    fn test_underrun_is_an_error_not_a_sentinel() {
        let mut message = Message::new();
        message.write_u16(0xFFFF).unwrap();
        assert_eq!(
            message.read_u32(),
            Err(MessageError::Underrun {
                needed: 4,
                remaining: 2
            })
        );
        // A failed read leaves the cursor alone
        assert_eq!(message.read_u16().unwrap(), 0xFFFF);
        assert!(message.read_u8().is_err());
    }

    #[test]
    fn test_unterminated_string() {
        let mut message = Message::from_bytes(b"abc").unwrap();
        assert_eq!(message.read_string(), Err(MessageError::UnterminatedString));
        assert_eq!(message.read_position(), 0);
    }

    #[test]
    fn test_overflow() {
        let mut message = Message::with_capacity(3);
        message.write_u16(1).unwrap();
        assert!(matches!(message.write_u16(2), Err(MessageError::Overflow { needed: 2, remaining: 1 })));
        assert!(message.write_string("ab").is_err());
        assert_eq!(message.len(), 2);
    }

    #[test]
    fn test_truncate_undoes_partial_entry() {
        let mut message = Message::with_capacity(4);
        message.write_u8(7).unwrap();
        let mark = message.len();
        message.write_u8(1).unwrap();
        assert!(message.write_u32(5).is_err());
        message.truncate(mark);
        assert_eq!(message.as_bytes(), &[7]);

        assert_eq!(message.read_u8().unwrap(), 7);
        message.truncate(0);
        assert_eq!(message.remaining(), 0);
        assert_eq!(message.read_position(), 0);
    }

    #[test]
    fn test_reserve_commit_block() {
        let mut message = Message::new();
        message.write_u8(9).unwrap();
        let reservation = message.reserve_block().unwrap();
        message.write_u32(1).unwrap();
        message.write_string("hi").unwrap();
        message.commit_block(reservation).unwrap();
        message.write_u8(10).unwrap();

        assert_eq!(message.read_u8().unwrap(), 9);
        let mut block = message.read_block().unwrap();
        assert_eq!(block.len(), 7);
        assert_eq!(block.read_u32().unwrap(), 1);
        assert_eq!(block.read_string().unwrap(), "hi");
        assert_eq!(message.read_u8().unwrap(), 10);
    }

    #[test]
    fn test_stale_reservation() {
        let mut message = Message::new();
        message.write_u32(0).unwrap();
        let reservation = message.reserve_block().unwrap();
        message.clear();
        assert_eq!(message.commit_block(reservation), Err(MessageError::StaleReservation(4)));
    }

    #[test]
    fn test_truncated_block_fails() {
        let mut message = Message::new();
        message.write_u16(10).unwrap();
        message.write_u32(0).unwrap();
        assert!(matches!(message.read_block(), Err(MessageError::Underrun { needed: 10, .. })));
    }
}
