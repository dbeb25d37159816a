//! Protocol constants shared by every layer.
//!
//! Frame layout:
//! ```text
//! ┌─────────┬──────────┬──────┬──────────┬─────────────┬──────────┬──────┐
//! │ Length  │ SenderID │ Type │ Sequence │ Payload     │ CRC-32   │ 0x55 │
//! │ (1B)    │ (4B LE)  │ (1B) │ (4B LE)  │ (0-113B)    │ (4B LE)  │ (1B) │
//! └─────────┴──────────┴──────┴──────────┴─────────────┴──────────┴──────┘
//! ```
//! Length counts every byte after itself.

use std::time::Duration;

/// Size of the length prefix.
pub const LENGTH_FIELD_SIZE: usize = 1;
/// Size of the sender identity field.
pub const SENDER_FIELD_SIZE: usize = 4;
/// Size of the frame type field.
pub const TYPE_FIELD_SIZE: usize = 1;
/// Size of the sequence number field.
pub const SEQUENCE_FIELD_SIZE: usize = 4;
/// CRC-32 (IEEE), little-endian.
pub const CRC_SIZE: usize = 4;
/// Trailing terminator byte.
pub const TERMINATOR_SIZE: usize = 1;

/// Bytes before the payload, length prefix included.
pub const HEADER_SIZE: usize =
    LENGTH_FIELD_SIZE + SENDER_FIELD_SIZE + TYPE_FIELD_SIZE + SEQUENCE_FIELD_SIZE;

/// Largest frame the radio carries.
pub const MAX_FRAME_SIZE: usize = 128;

/// Largest payload that fits a frame.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - HEADER_SIZE - CRC_SIZE - TERMINATOR_SIZE;

/// Smallest valid frame (empty payload).
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CRC_SIZE + TERMINATOR_SIZE;

/// Value of the last byte of every frame.
pub const FRAME_TERMINATOR: u8 = 0x55;

/// Wire tag: pairing request.
pub const FRAME_TYPE_PAIRING: u8 = 0x01;
/// Wire tag: application data.
pub const FRAME_TYPE_DATA: u8 = 0x02;
/// Wire tag: liveness heartbeat.
pub const FRAME_TYPE_HEARTBEAT: u8 = 0x03;
/// Wire tag: acknowledgement.
pub const FRAME_TYPE_ACK: u8 = 0x04;

/// Default RF channel.
pub const DEFAULT_CHANNEL: u8 = 7;
/// Default base address.
pub const DEFAULT_ADDRESS: u32 = 0xE7E7_E7E7;
/// Default address prefix.
pub const DEFAULT_PREFIX: u8 = 0xE7;

/// Pairing payload: key (4B LE) + target receiver identity (4B LE).
pub const PAIRING_PAYLOAD_SIZE: usize = 8;

/// Interval between transmitter heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5_000);
/// Deadline for a pairing handshake.
pub const PAIRING_TIMEOUT: Duration = Duration::from_millis(30_000);
/// A paired device silent for longer than this is evicted.
pub const DEVICE_TIMEOUT: Duration = Duration::from_millis(15_000);
/// Cadence of the receiver's eviction pass.
pub const CLEANUP_INTERVAL: Duration = Duration::from_millis(7_500);
/// Deadline for a blocking single-shot receive.
pub const RECEIVE_DATA_TIMEOUT: Duration = Duration::from_millis(5_000);
/// How long a reliable send waits for an ack after each attempt.
pub const ACK_WINDOW: Duration = Duration::from_millis(200);
/// Per-call receive timeout while waiting inside an ack window.
pub const ACK_POLL: Duration = Duration::from_millis(20);
/// Per-call receive timeout of polling loops.
pub const RX_POLL: Duration = Duration::from_millis(100);
/// Fixed part of the reliable-send backoff.
pub const BACKOFF_BASE: Duration = Duration::from_millis(20);
/// Per-attempt growth of the reliable-send backoff.
pub const BACKOFF_STEP: Duration = Duration::from_millis(10);
