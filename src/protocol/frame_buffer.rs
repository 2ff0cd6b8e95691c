//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management and a state
//! machine for handling fragmented frames:
//! - `WaitingForHeader`: need at least 7 bytes
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! Parsing policy:
//! - RESPONSE headers complete immediately; the length field is a status
//!   code and no body follows.
//! - A declared length above [`MAX_PAYLOAD_SIZE`] is corruption: the
//!   7-byte header is dropped and parsing resynchronizes on the next byte.
//! - Completed frames with an opcode outside the catalogue are dropped
//!   silently.

use bytes::BytesMut;

use super::command::Command;
use super::response::ResponseCode;
use super::wire_format::{Header, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use super::Frame;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete header (need 7 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: Header, remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Driven by the transport's read loop; it never blocks waiting for data.
/// State is mutated only through `&mut self`, so a caller that shares the
/// buffer across workers wraps it in a mutex.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl FrameBuffer {
    /// Create a new frame buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForHeader,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns the frames completed by this chunk, in arrival order.
    /// Fragmented trailing bytes are retained for the next push. Malformed
    /// or unknown messages are dropped, never surfaced as errors.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one() {
            if let Some(frame) = frame {
                frames.push(frame);
            }
        }
        frames
    }

    /// Try to consume a single message from the buffer.
    ///
    /// Returns:
    /// - `Some(Some(frame))` when a complete known frame was extracted
    /// - `Some(None)` when a complete message was consumed but dropped
    /// - `None` when more data is needed
    fn try_extract_one(&mut self) -> Option<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                if self.buffer.len() < HEADER_SIZE {
                    return None;
                }

                let header =
                    Header::decode(&self.buffer[..HEADER_SIZE]).expect("buffer has enough bytes");

                // RESPONSE carries no body; the length field is a status.
                if header.is_response() {
                    let _ = self.buffer.split_to(HEADER_SIZE);
                    return Some(Some(Frame::Response {
                        message_id: header.message_id,
                        code: ResponseCode::from_u32(header.status_or_length),
                    }));
                }

                if header.status_or_length > MAX_PAYLOAD_SIZE {
                    tracing::warn!(
                        command = header.command,
                        length = header.status_or_length,
                        "dropping header with oversized length"
                    );
                    let _ = self.buffer.split_to(HEADER_SIZE);
                    return Some(None);
                }

                let _ = self.buffer.split_to(HEADER_SIZE);

                if header.status_or_length == 0 {
                    return Some(Self::finish(header, BytesMut::new()));
                }

                self.state = State::WaitingForPayload {
                    header,
                    remaining: header.status_or_length,
                };

                // Try to get the payload immediately.
                self.try_extract_one()
            }

            State::WaitingForPayload { header, remaining } => {
                let remaining = *remaining as usize;

                if self.buffer.len() < remaining {
                    return None;
                }

                let payload = self.buffer.split_to(remaining);
                let header = *header;
                self.state = State::WaitingForHeader;

                Some(Self::finish(header, payload))
            }
        }
    }

    /// Build the frame for a fully-consumed message, or drop it if the
    /// opcode is outside the catalogue.
    fn finish(header: Header, payload: BytesMut) -> Option<Frame> {
        match Command::from_u8(header.command) {
            Some(command) => Some(Frame::Command {
                command,
                message_id: header.message_id,
                payload: payload.freeze(),
            }),
            None => {
                tracing::debug!(command = header.command, "dropping frame with unknown opcode");
                None
            }
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
