/// Reasons a byte sequence is not a valid frame.
///
/// Only [`inspect_frame`](crate::inspect_frame) surfaces these; the receive
/// path uses [`decode_frame`](crate::decode_frame), which collapses every
/// variant into `None`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than header + CRC + terminator.
    #[error("frame too short ({len} bytes, min {min})")]
    TooShort { len: usize, min: usize },

    /// The length byte is zero, too small for a header, or points past the buffer.
    #[error("invalid body length {body_len} ({available} bytes available)")]
    InvalidLength { body_len: usize, available: usize },

    /// The byte where the terminator belongs holds something else.
    #[error("missing frame terminator (found 0x{0:02X}, expected 0x55)")]
    MissingTerminator(u8),

    /// The embedded CRC does not match the payload.
    #[error("crc mismatch (embedded 0x{expected:08X}, computed 0x{actual:08X})")]
    CrcMismatch { expected: u32, actual: u32 },

    /// The payload exceeds what a single frame can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
