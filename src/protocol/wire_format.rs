//! Wire format encoding and decoding.
//!
//! Implements the 7-byte mobile header:
//! ```text
//! ┌─────────┬────────────┬──────────────────┐
//! │ Command │ Message ID │ Status or Length │
//! │ 1 byte  │ 2 bytes BE │ 4 bytes BE       │
//! └─────────┴────────────┴──────────────────┘
//! ```
//!
//! The third field is a response status code when `command == 0`
//! (RESPONSE), otherwise the payload byte count. All multi-byte integers
//! are Big Endian.
//!
//! A companion [`encode_hardware`] produces the 5-byte hardware-side
//! header (2-byte length); the client itself only speaks the 7-byte form.

/// Mobile header size in bytes (fixed, exactly 7).
pub const HEADER_SIZE: usize = 7;

/// Hardware header size in bytes (2-byte length field).
pub const HARDWARE_HEADER_SIZE: usize = 5;

/// Sanity cap on declared payload length. Larger lengths are treated as
/// corruption; the parser drops the header and resynchronizes.
pub const MAX_PAYLOAD_SIZE: u32 = 10_000_000;

/// NUL byte separating UTF-8 fields inside a body.
pub const BODY_SEPARATOR: u8 = 0x00;

/// Decoded 7-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command code (0 = RESPONSE).
    pub command: u8,
    /// Message id assigned by the sender.
    pub message_id: u16,
    /// Response status code iff `command == 0`, payload length otherwise.
    pub status_or_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(command: u8, message_id: u16, status_or_length: u32) -> Self {
        Self {
            command,
            message_id,
            status_or_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is smaller than `HEADER_SIZE` (7 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = self.command;
        buf[1..3].copy_from_slice(&self.message_id.to_be_bytes());
        buf[3..7].copy_from_slice(&self.status_or_length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if the buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            command: buf[0],
            message_id: u16::from_be_bytes([buf[1], buf[2]]),
            status_or_length: u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]),
        })
    }

    /// Check if this is a RESPONSE header.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.command == 0
    }
}

/// Encode a frame with the 5-byte hardware header (2-byte length).
///
/// Hardware boards frame their messages with a 16-bit length field; the
/// payload is truncated at `u16::MAX` bytes by the caller's contract.
/// Not used by the session controller.
pub fn encode_hardware(command: u8, message_id: u16, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= u16::MAX as usize);
    let mut buf = Vec::with_capacity(HARDWARE_HEADER_SIZE + payload.len());
    buf.push(command);
    buf.extend_from_slice(&message_id.to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}
