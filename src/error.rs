//! Error types for blynk-client.

use thiserror::Error;

use crate::protocol::ResponseCode;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum BlynkError {
    /// TLS/transport failed to establish within the connect timeout.
    #[error("failed to establish connection: {0}")]
    Connect(String),

    /// Send attempted with no live transport.
    #[error("not connected")]
    NotConnected,

    /// LOGIN or SHARE_LOGIN was rejected by the server.
    #[error("authentication rejected: {0}")]
    Auth(ResponseCode),

    /// Any other non-OK response to a request.
    #[error("server returned {0}")]
    Server(ResponseCode),

    /// Deadline expired before a reply arrived.
    #[error("request timed out")]
    Timeout,

    /// Transport terminated while the request was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// Payload serialization of a domain record failed.
    #[error("payload encoding failed: {0}")]
    Encode(String),

    /// Payload deserialization of a domain record failed.
    #[error("payload decoding failed: {0}")]
    Decode(String),

    /// Compressed profile or graph payload could not be decoded.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// Every 16-bit message id is currently pending.
    #[error("message id space exhausted")]
    Saturated,

    /// The controller was disconnected mid-request.
    #[error("request cancelled")]
    Cancelled,

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using BlynkError.
pub type Result<T> = std::result::Result<T, BlynkError>;
