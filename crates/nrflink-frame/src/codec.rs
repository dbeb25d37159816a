use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::constants::{
    CRC_SIZE, FRAME_TERMINATOR, FRAME_TYPE_ACK, FRAME_TYPE_DATA, FRAME_TYPE_HEARTBEAT,
    FRAME_TYPE_PAIRING, HEADER_SIZE, LENGTH_FIELD_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE,
    MIN_FRAME_SIZE, TERMINATOR_SIZE,
};
use crate::error::{FrameError, Result};

/// Application-chosen 32-bit identity, unique per physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Little-endian wire representation.
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Read an identity from the first four bytes of `bytes`.
    pub fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(u32::from_le_bytes(raw)))
    }
}

impl From<u32> for DeviceId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Kind of frame, carried in the type byte.
///
/// Tags outside the four protocol types still decode, as [`FrameType::Unknown`],
/// so a newer peer's frames reach the state machine instead of vanishing in
/// the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Pairing,
    Data,
    Heartbeat,
    Ack,
    Unknown(u8),
}

impl FrameType {
    /// Wire tag.
    pub fn as_u8(self) -> u8 {
        match self {
            FrameType::Pairing => FRAME_TYPE_PAIRING,
            FrameType::Data => FRAME_TYPE_DATA,
            FrameType::Heartbeat => FRAME_TYPE_HEARTBEAT,
            FrameType::Ack => FRAME_TYPE_ACK,
            FrameType::Unknown(tag) => tag,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            FrameType::Pairing => "PAIRING",
            FrameType::Data => "DATA",
            FrameType::Heartbeat => "HEARTBEAT",
            FrameType::Ack => "ACK",
            FrameType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value {
            FRAME_TYPE_PAIRING => FrameType::Pairing,
            FRAME_TYPE_DATA => FrameType::Data,
            FRAME_TYPE_HEARTBEAT => FrameType::Heartbeat,
            FRAME_TYPE_ACK => FrameType::Ack,
            other => FrameType::Unknown(other),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Unknown(tag) => write!(f, "UNKNOWN(0x{tag:02X})"),
            known => f.write_str(known.name()),
        }
    }
}

/// One on-air protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Identity of the transmitting device.
    pub sender: DeviceId,
    /// What the frame means.
    pub frame_type: FrameType,
    /// Per-session sequence number of the sender.
    pub sequence: u32,
    /// Application or protocol payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(
        sender: DeviceId,
        frame_type: FrameType,
        sequence: u32,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            sender,
            frame_type,
            sequence,
            payload: payload.into(),
        }
    }

    /// Encode into a freshly allocated buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(
            self.sender,
            self.frame_type,
            self.sequence,
            &self.payload,
            &mut buf,
        );
        buf.freeze()
    }

    /// Total bytes on air, after payload truncation.
    pub fn wire_size(&self) -> usize {
        MIN_FRAME_SIZE + self.payload.len().min(MAX_PAYLOAD_SIZE)
    }

    /// Value of the length byte: wire size minus the length field itself.
    pub fn body_len(&self) -> u8 {
        (self.wire_size() - LENGTH_FIELD_SIZE) as u8
    }

    /// Copy with a payload that shares nothing with this frame.
    pub fn detached(&self) -> Self {
        Self {
            payload: Bytes::copy_from_slice(&self.payload),
            ..self.clone()
        }
    }
}

/// CRC-32 (IEEE) of a payload. The CRC of an empty payload is zero.
pub fn crc32(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Encode a frame into the wire format, appending to `dst`.
///
/// Payloads longer than [`MAX_PAYLOAD_SIZE`] are silently truncated so the
/// frame never exceeds [`MAX_FRAME_SIZE`]; the CRC covers the truncated
/// payload. Encoding cannot fail.
pub fn encode_frame(
    sender: DeviceId,
    frame_type: FrameType,
    sequence: u32,
    payload: &[u8],
    dst: &mut BytesMut,
) {
    let payload = &payload[..payload.len().min(MAX_PAYLOAD_SIZE)];
    let total = MIN_FRAME_SIZE + payload.len();
    debug_assert!(total <= MAX_FRAME_SIZE);

    dst.reserve(total);
    dst.put_u8((total - LENGTH_FIELD_SIZE) as u8);
    dst.put_u32_le(sender.0);
    dst.put_u8(frame_type.as_u8());
    dst.put_u32_le(sequence);
    dst.put_slice(payload);
    dst.put_u32_le(crc32(payload));
    dst.put_u8(FRAME_TERMINATOR);
}

/// Decode a frame, or `None` if the bytes are not a valid frame.
///
/// The returned payload is an independent copy of the input bytes.
pub fn decode_frame(data: &[u8]) -> Option<Frame> {
    match inspect_frame(data) {
        Ok(frame) => Some(frame),
        Err(err) => {
            trace!(len = data.len(), reason = %err, "dropping invalid frame");
            None
        }
    }
}

/// Decode a frame, reporting why it was rejected.
///
/// Trailing bytes after the terminator are ignored.
pub fn inspect_frame(data: &[u8]) -> Result<Frame> {
    if data.len() < MIN_FRAME_SIZE {
        return Err(FrameError::TooShort {
            len: data.len(),
            min: MIN_FRAME_SIZE,
        });
    }

    let body_len = data[0] as usize;
    if body_len == 0 || body_len + LENGTH_FIELD_SIZE > data.len() {
        return Err(FrameError::InvalidLength {
            body_len,
            available: data.len(),
        });
    }

    let terminator = data[body_len];
    if terminator != FRAME_TERMINATOR {
        return Err(FrameError::MissingTerminator(terminator));
    }

    let total = body_len + LENGTH_FIELD_SIZE;
    if total < MIN_FRAME_SIZE {
        return Err(FrameError::InvalidLength {
            body_len,
            available: data.len(),
        });
    }

    let payload_len = total - MIN_FRAME_SIZE;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let crc_offset = HEADER_SIZE + payload_len;
    let payload = &data[HEADER_SIZE..crc_offset];
    let embedded = u32::from_le_bytes(read_array(data, crc_offset));
    let computed = crc32(payload);
    if embedded != computed {
        return Err(FrameError::CrcMismatch {
            expected: embedded,
            actual: computed,
        });
    }
    debug_assert_eq!(crc_offset + CRC_SIZE + TERMINATOR_SIZE, total);

    Ok(Frame {
        sender: DeviceId(u32::from_le_bytes(read_array(data, 1))),
        frame_type: FrameType::from(data[5]),
        sequence: u32::from_le_bytes(read_array(data, 6)),
        payload: Bytes::copy_from_slice(payload),
    })
}

fn read_array(data: &[u8], offset: usize) -> [u8; 4] {
    [
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(sender: u32, frame_type: FrameType, sequence: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(DeviceId(sender), frame_type, sequence, payload, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_encode_known_layout() {
        let wire = encode(0xCAFE, FrameType::Data, 42, &[1, 2, 3, 4, 5]);

        // 10-byte header + 5-byte payload + 4-byte CRC + terminator.
        assert_eq!(wire.len(), 20);
        assert_eq!(wire[0], 19);
        assert_eq!(&wire[1..5], &[0xFE, 0xCA, 0x00, 0x00]);
        assert_eq!(wire[5], FRAME_TYPE_DATA);
        assert_eq!(&wire[6..10], &[42, 0, 0, 0]);
        assert_eq!(&wire[10..15], &[1, 2, 3, 4, 5]);
        assert_eq!(&wire[15..19], &crc32(&[1, 2, 3, 4, 5]).to_le_bytes());
        assert_eq!(wire[19], FRAME_TERMINATOR);

        let frame = decode_frame(&wire).unwrap();
        assert_eq!(frame.sender, DeviceId(0xCAFE));
        assert_eq!(frame.frame_type, FrameType::Data);
        assert_eq!(frame.sequence, 42);
        assert_eq!(frame.payload.as_ref(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let cases: [(u32, FrameType, u32, Vec<u8>); 4] = [
            (0xCAFE, FrameType::Data, 42, Vec::new()),
            (0xBEEF, FrameType::Pairing, 123, vec![9; 8]),
            (0xDEAD, FrameType::Ack, u32::MAX, vec![0xAA; MAX_PAYLOAD_SIZE]),
            (0, FrameType::Heartbeat, 0, Vec::new()),
        ];

        for (sender, frame_type, sequence, payload) in cases {
            let wire = encode(sender, frame_type, sequence, &payload);
            assert_eq!(wire.len(), MIN_FRAME_SIZE + payload.len());
            assert_eq!(wire[0] as usize, wire.len() - 1);

            let frame = decode_frame(&wire).unwrap();
            assert_eq!(frame.sender, DeviceId(sender));
            assert_eq!(frame.frame_type, frame_type);
            assert_eq!(frame.sequence, sequence);
            assert_eq!(frame.payload.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn test_empty_payload_has_zero_crc() {
        let wire = encode(1, FrameType::Heartbeat, 7, &[]);
        assert_eq!(wire.len(), MIN_FRAME_SIZE);
        assert_eq!(&wire[10..14], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_oversized_payload_truncated() {
        let payload = vec![0xAA; MAX_PAYLOAD_SIZE * 2];
        let wire = encode(0xBEEF, FrameType::Data, 1, &payload);
        assert_eq!(wire.len(), MAX_FRAME_SIZE);
        assert_eq!(wire[0] as usize, MAX_FRAME_SIZE - 1);

        let frame = decode_frame(&wire).unwrap();
        assert_eq!(frame.payload.len(), MAX_PAYLOAD_SIZE);
        assert_eq!(frame.payload.as_ref(), &payload[..MAX_PAYLOAD_SIZE]);
    }

    #[test]
    fn test_frame_encode_matches_free_function() {
        let frame = Frame::new(DeviceId(5), FrameType::Data, 9, vec![1, 2, 3]);
        assert_eq!(frame.encode().as_ref(), encode(5, FrameType::Data, 9, &[1, 2, 3]));
        assert_eq!(frame.wire_size(), 18);
        assert_eq!(frame.body_len(), 17);
        assert_eq!(frame.encode()[0], 17);

        let big = Frame::new(DeviceId(5), FrameType::Data, 9, vec![0; 500]);
        assert_eq!(big.wire_size(), MAX_FRAME_SIZE);
        assert_eq!(big.encode().len(), MAX_FRAME_SIZE);
    }

    #[test]
    fn test_decode_too_short() {
        assert!(decode_frame(&[]).is_none());
        assert!(decode_frame(&[0x01, 0x02]).is_none());
        let wire = encode(1, FrameType::Data, 1, &[]);
        for len in 0..MIN_FRAME_SIZE {
            assert!(matches!(
                inspect_frame(&wire[..len]),
                Err(FrameError::TooShort { .. })
            ));
        }
    }

    #[test]
    fn test_decode_bad_length_byte() {
        let mut data = vec![0xFF, 0xEF, 0xBE, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00];
        data.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            inspect_frame(&data),
            Err(FrameError::InvalidLength { .. })
        ));

        let mut zero = encode(1, FrameType::Data, 1, &[1]);
        zero[0] = 0;
        assert!(matches!(
            inspect_frame(&zero),
            Err(FrameError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_decode_length_too_small_for_header() {
        let mut data = vec![0u8; 20];
        data[0] = 5;
        data[5] = FRAME_TERMINATOR;
        assert!(matches!(
            inspect_frame(&data),
            Err(FrameError::InvalidLength { body_len: 5, .. })
        ));
    }

    #[test]
    fn test_decode_wrong_terminator() {
        let mut wire = encode(0xBEEF, FrameType::Data, 1, &[1, 2, 3]);
        let last = wire.len() - 1;
        wire[last] = 0xAA;
        assert_eq!(
            inspect_frame(&wire),
            Err(FrameError::MissingTerminator(0xAA))
        );
    }

    #[test]
    fn test_decode_rejects_any_crc_bit_flip() {
        let payload = [1u8, 2, 3];
        let wire = encode(0xBEEF, FrameType::Data, 1, &payload);
        let crc_offset = HEADER_SIZE + payload.len();

        for byte in crc_offset..crc_offset + CRC_SIZE {
            for bit in 0..8 {
                let mut corrupted = wire.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    matches!(
                        inspect_frame(&corrupted),
                        Err(FrameError::CrcMismatch { .. })
                    ),
                    "flip of bit {bit} in byte {byte} was accepted"
                );
            }
        }
    }

    #[test]
    fn test_decode_rejects_payload_corruption() {
        let mut wire = encode(0xBEEF, FrameType::Data, 1, b"payload");
        wire[HEADER_SIZE + 2] ^= 0x10;
        assert!(decode_frame(&wire).is_none());
    }

    #[test]
    fn test_decode_keeps_unknown_type() {
        let mut wire = encode(1, FrameType::Data, 1, &[1]);
        wire[5] = 0x09;

        let frame = decode_frame(&wire).unwrap();
        assert_eq!(frame.frame_type, FrameType::Unknown(0x09));
        assert_eq!(frame.payload.as_ref(), &[1]);
        assert_eq!(frame.encode().as_ref(), wire.as_slice());
    }

    #[test]
    fn test_decode_payload_longer_than_protocol_allows() {
        let payload = vec![0x11; MAX_PAYLOAD_SIZE + 1];
        let total = MIN_FRAME_SIZE + payload.len();
        let mut wire = Vec::with_capacity(total);
        wire.push((total - 1) as u8);
        wire.extend_from_slice(&1u32.to_le_bytes());
        wire.push(FRAME_TYPE_DATA);
        wire.extend_from_slice(&1u32.to_le_bytes());
        wire.extend_from_slice(&payload);
        wire.extend_from_slice(&crc32(&payload).to_le_bytes());
        wire.push(FRAME_TERMINATOR);

        assert!(matches!(
            inspect_frame(&wire),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut wire = encode(3, FrameType::Ack, 77, &[4, 3, 2, 1]);
        wire.extend_from_slice(&[0u8; 32]);
        let frame = decode_frame(&wire).unwrap();
        assert_eq!(frame.sequence, 77);
        assert_eq!(frame.payload.as_ref(), &[4, 3, 2, 1]);
    }

    #[test]
    fn test_decoded_payload_is_independent() {
        let mut wire = encode(3, FrameType::Data, 1, &[1, 2, 3]);
        let frame = decode_frame(&wire).unwrap();
        wire[HEADER_SIZE] = 0xFF;
        assert_eq!(frame.payload.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_frame_type_tags() {
        for tag in 0..=u8::MAX {
            assert_eq!(FrameType::from(tag).as_u8(), tag);
        }
        assert_eq!(FrameType::from(0), FrameType::Unknown(0));
        assert_eq!(FrameType::from(4), FrameType::Ack);
        assert_eq!(FrameType::Heartbeat.to_string(), "HEARTBEAT");
        assert_eq!(FrameType::Unknown(0x2A).to_string(), "UNKNOWN(0x2A)");
    }

    #[test]
    fn test_device_id_helpers() {
        let id = DeviceId(0xBEEF);
        assert_eq!(DeviceId::from_le_slice(&id.to_le_bytes()), Some(id));
        assert_eq!(DeviceId::from_le_slice(&[1, 2, 3]), None);
        assert_eq!(id.to_string(), "0x0000beef");
    }
}
