//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary mobile protocol:
//! - 7-byte header encoding/decoding (plus the 5-byte hardware variant)
//! - Opcode and response-code catalogues
//! - Frame buffer for accumulating partial reads

mod command;
mod frame;
mod frame_buffer;
mod response;
mod wire_format;

pub use command::Command;
pub use frame::{join_body, split_body, Frame};
pub use frame_buffer::FrameBuffer;
pub use response::ResponseCode;
pub use wire_format::{
    encode_hardware, Header, BODY_SEPARATOR, HARDWARE_HEADER_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
