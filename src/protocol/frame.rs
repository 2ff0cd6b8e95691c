//! Frame type and body helpers.
//!
//! A [`Frame`] is one complete protocol message. RESPONSE frames carry a
//! status code and never a body; command frames carry an opcode and a
//! payload whose text fields are NUL-separated UTF-8.
//! Payloads use `bytes::Bytes` for zero-copy sharing.

use bytes::Bytes;

use super::command::Command;
use super::response::ResponseCode;
use super::wire_format::{Header, BODY_SEPARATOR, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Status reply. The length field carries the code; there is no body.
    Response {
        /// Id of the request this answers.
        message_id: u16,
        /// Decoded status code.
        code: ResponseCode,
    },
    /// Any non-RESPONSE message.
    Command {
        /// Opcode from the catalogue.
        command: Command,
        /// Message id assigned by the sender.
        message_id: u16,
        /// Payload bytes (zero-copy via `bytes::Bytes`).
        payload: Bytes,
    },
}

impl Frame {
    /// Create a RESPONSE frame.
    pub fn response(message_id: u16, code: ResponseCode) -> Self {
        Frame::Response { message_id, code }
    }

    /// Create a command frame.
    pub fn command(command: Command, message_id: u16, payload: impl Into<Bytes>) -> Self {
        Frame::Command {
            command,
            message_id,
            payload: payload.into(),
        }
    }

    /// Message id of this frame.
    #[inline]
    pub fn message_id(&self) -> u16 {
        match self {
            Frame::Response { message_id, .. } | Frame::Command { message_id, .. } => *message_id,
        }
    }

    /// Payload bytes; empty for RESPONSE frames.
    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Response { .. } => &[],
            Frame::Command { payload, .. } => payload,
        }
    }

    /// Encode this frame as a contiguous byte sequence.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Response { message_id, code } => {
                Header::new(0, *message_id, code.as_u32()).encode().to_vec()
            }
            Frame::Command {
                command,
                message_id,
                payload,
            } => {
                let header = Header::new(command.code(), *message_id, payload.len() as u32);
                let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
                buf.extend_from_slice(&header.encode());
                buf.extend_from_slice(payload);
                buf
            }
        }
    }
}

/// Join UTF-8 field values with a single NUL byte.
pub fn join_body<S: AsRef<str>>(fields: &[S]) -> Vec<u8> {
    let mut len = 0;
    for f in fields {
        len += f.as_ref().len() + 1;
    }
    let mut buf = Vec::with_capacity(len.saturating_sub(1));
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            buf.push(BODY_SEPARATOR);
        }
        buf.extend_from_slice(f.as_ref().as_bytes());
    }
    buf
}

/// Split a body into its NUL-separated text fields.
///
/// Invalid UTF-8 sequences are replaced, never rejected; the caller
/// validates field contents.
pub fn split_body(payload: &[u8]) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload
        .split(|&b| b == BODY_SEPARATOR)
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect()
}
