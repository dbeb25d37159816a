use std::fmt;
use std::time::{Duration, Instant};

use nrflink_frame::constants::{DEFAULT_ADDRESS, DEFAULT_CHANNEL, DEFAULT_PREFIX};
use nrflink_frame::DeviceId;

/// Which end of the link a device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceRole {
    Transmitter = 1,
    Receiver = 2,
}

/// One pairing-table entry: identity, radio addressing and liveness.
///
/// A device with `paired == false` must not be used for data exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Device {
    /// Application-chosen identity.
    pub id: DeviceId,
    /// Role this entry describes.
    pub role: DeviceRole,
    /// Radio base address.
    pub address: u32,
    /// Radio address prefix.
    pub prefix: u8,
    /// RF channel, 0-125.
    pub channel: u8,
    /// Opaque session token agreed during pairing.
    /// Not a cryptographic secret, but redacted in debug output.
    pub pairing_key: u32,
    /// Whether the pairing handshake completed.
    pub paired: bool,
    /// Last time traffic from this device was accepted.
    pub last_seen: Instant,
}

impl Device {
    /// Create an unpaired entry with default addressing.
    pub fn new(id: DeviceId, role: DeviceRole) -> Self {
        Self {
            id,
            role,
            address: DEFAULT_ADDRESS,
            prefix: DEFAULT_PREFIX,
            channel: DEFAULT_CHANNEL,
            pairing_key: 0,
            paired: false,
            last_seen: Instant::now(),
        }
    }

    /// Create a transmitter entry.
    pub fn transmitter(id: DeviceId) -> Self {
        Self::new(id, DeviceRole::Transmitter)
    }

    /// Create a receiver entry.
    pub fn receiver(id: DeviceId) -> Self {
        Self::new(id, DeviceRole::Receiver)
    }

    /// Refresh the liveness timestamp.
    pub fn touch(&mut self) {
        self.touch_at(Instant::now());
    }

    /// Refresh the liveness timestamp to `now`.
    pub fn touch_at(&mut self, now: Instant) {
        self.last_seen = now;
    }

    /// How long the device has been silent as of `now`.
    pub fn silent_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// Paired and heard from within `timeout` as of `now`.
    pub fn is_alive(&self, now: Instant, timeout: Duration) -> bool {
        self.paired && self.silent_for(now) < timeout
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("address", &format_args!("{:#010x}", self.address))
            .field("prefix", &format_args!("{:#04x}", self.prefix))
            .field("channel", &self.channel)
            .field("pairing_key", &format_args!("<redacted>"))
            .field("paired", &self.paired)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_device_defaults() {
        let dev = Device::transmitter(DeviceId(0xCAFE));
        assert_eq!(dev.address, 0xE7E7E7E7);
        assert_eq!(dev.prefix, 0xE7);
        assert_eq!(dev.channel, 7);
        assert_eq!(dev.role, DeviceRole::Transmitter);
        assert!(!dev.paired);
    }

    #[test]
    fn unpaired_device_is_never_alive() {
        let dev = Device::receiver(DeviceId(1));
        assert!(!dev.is_alive(Instant::now(), Duration::from_secs(15)));
    }

    #[test]
    fn liveness_expires() {
        let mut dev = Device::transmitter(DeviceId(1));
        dev.paired = true;
        let now = Instant::now();
        dev.touch_at(now);

        assert!(dev.is_alive(now + Duration::from_secs(14), Duration::from_secs(15)));
        assert!(!dev.is_alive(now + Duration::from_secs(15), Duration::from_secs(15)));
        assert_eq!(dev.silent_for(now + Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[test]
    fn debug_output_redacts_pairing_key() {
        let mut dev = Device::transmitter(DeviceId(1));
        dev.pairing_key = 0x1234_5678;
        let out = format!("{dev:?}");
        assert!(out.contains("<redacted>"));
        assert!(!out.contains("305419896"));
        assert!(!out.contains("12345678"));
    }
}
