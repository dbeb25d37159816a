//! Pairing handshake payloads and session-token generation.
//!
//! The handshake is a single request/response pair:
//! 1. The transmitter sends a PAIRING frame carrying its key and the identity
//!    of the receiver it wants.
//! 2. The targeted receiver records the transmitter and answers with an ACK
//!    echoing the pairing frame's sequence, carrying its own identity.

use std::time::{SystemTime, UNIX_EPOCH};

use nrflink_frame::constants::PAIRING_PAYLOAD_SIZE;
use nrflink_frame::DeviceId;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use tracing::warn;

/// Body of a PAIRING frame.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PairingRequest {
    /// Session token chosen by the transmitter.
    pub key: u32,
    /// Receiver the transmitter wants to pair with.
    pub target: DeviceId,
}

impl PairingRequest {
    /// Wire form: key (4B LE) then target identity (4B LE).
    pub fn encode(&self) -> [u8; PAIRING_PAYLOAD_SIZE] {
        let mut buf = [0u8; PAIRING_PAYLOAD_SIZE];
        buf[..4].copy_from_slice(&self.key.to_le_bytes());
        buf[4..].copy_from_slice(&self.target.to_le_bytes());
        buf
    }

    /// Parse a PAIRING payload. Extra trailing bytes are ignored.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < PAIRING_PAYLOAD_SIZE {
            return None;
        }
        let key = u32::from_le_bytes(payload[..4].try_into().ok()?);
        let target = DeviceId::from_le_slice(&payload[4..])?;
        Some(Self { key, target })
    }
}

impl std::fmt::Debug for PairingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingRequest")
            .field("key", &format_args!("<redacted>"))
            .field("target", &self.target)
            .finish()
    }
}

/// Body of an ACK frame: the acknowledging receiver's identity.
pub fn ack_payload(receiver: DeviceId) -> [u8; 4] {
    receiver.to_le_bytes()
}

/// Identity carried by an ACK payload, if it has one.
pub fn ack_sender(payload: &[u8]) -> Option<DeviceId> {
    DeviceId::from_le_slice(payload)
}

/// Generate a 32-bit pairing key.
///
/// Uses the operating system RNG; falls back to a time-seeded PRNG only if
/// the OS source fails.
pub fn generate_pairing_key() -> u32 {
    let mut buf = [0u8; 4];
    match OsRng.try_fill_bytes(&mut buf) {
        Ok(()) => u32::from_le_bytes(buf),
        Err(err) => {
            warn!(error = %err, "os rng unavailable; using time-seeded pairing key");
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default();
            StdRng::seed_from_u64(seed).next_u32()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_layout() {
        let req = PairingRequest {
            key: 0x0403_0201,
            target: DeviceId(0xBEEF),
        };
        assert_eq!(req.encode(), [1, 2, 3, 4, 0xEF, 0xBE, 0, 0]);
        assert_eq!(PairingRequest::decode(&req.encode()), Some(req));
    }

    #[test]
    fn short_request_rejected() {
        assert!(PairingRequest::decode(&[1, 2, 3, 4, 5, 6, 7]).is_none());
        assert!(PairingRequest::decode(&[]).is_none());
    }

    #[test]
    fn long_request_accepted() {
        let mut payload = PairingRequest {
            key: 9,
            target: DeviceId(10),
        }
        .encode()
        .to_vec();
        payload.extend_from_slice(&[0xFF; 4]);
        let req = PairingRequest::decode(&payload).unwrap();
        assert_eq!(req.key, 9);
        assert_eq!(req.target, DeviceId(10));
    }

    #[test]
    fn ack_payload_roundtrip() {
        assert_eq!(ack_sender(&ack_payload(DeviceId(0xBEEF))), Some(DeviceId(0xBEEF)));
        assert_eq!(ack_sender(&[]), None);
    }

    #[test]
    fn pairing_keys_vary() {
        let keys: std::collections::HashSet<u32> =
            (0..16).map(|_| generate_pairing_key()).collect();
        assert!(keys.len() > 1);
    }

    #[test]
    fn debug_output_redacts_key() {
        let req = PairingRequest {
            key: 0xDEAD_BEEF,
            target: DeviceId(1),
        };
        let out = format!("{req:?}");
        assert!(out.contains("<redacted>"));
        assert!(!out.contains("3735928559"));
    }
}
