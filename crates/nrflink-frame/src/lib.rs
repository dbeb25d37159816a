//! Compact binary framing for a ≤128-byte unreliable radio link.
//!
//! Every on-air frame carries:
//! - A 1-byte body length (total length minus one)
//! - A 4-byte little-endian sender identity
//! - A 1-byte frame type and a 4-byte little-endian sequence number
//! - Up to 113 payload bytes, a CRC-32 of the payload and a 0x55 terminator
//!
//! Decoding is best-effort: anything malformed is "no frame", never a panic.

pub mod codec;
pub mod constants;
pub mod error;

pub use codec::{crc32, decode_frame, encode_frame, inspect_frame, DeviceId, Frame, FrameType};
pub use constants::{
    CRC_SIZE, FRAME_TERMINATOR, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE,
};
pub use error::{FrameError, Result};
