//! Receiver-side table of paired transmitters.
//!
//! The registry itself is not synchronized; the owning receiver keeps it
//! behind its single state lock and never holds that lock across radio I/O
//! or application callbacks.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use nrflink_frame::DeviceId;
use tracing::info;

use crate::device::Device;

/// Paired devices keyed by identity.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, Device>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed pairing from `id`, creating the entry if needed.
    ///
    /// Returns `true` when the device was not previously known.
    pub fn upsert_on_pairing(&mut self, id: DeviceId, pairing_key: u32) -> bool {
        self.upsert_on_pairing_at(id, pairing_key, Instant::now())
    }

    pub(crate) fn upsert_on_pairing_at(
        &mut self,
        id: DeviceId,
        pairing_key: u32,
        now: Instant,
    ) -> bool {
        let created = !self.devices.contains_key(&id);
        let device = self
            .devices
            .entry(id)
            .or_insert_with(|| Device::transmitter(id));
        device.pairing_key = pairing_key;
        device.paired = true;
        device.touch_at(now);
        created
    }

    /// Refresh liveness of a paired device. No-op for unknown or unpaired ids.
    ///
    /// Returns whether the device was refreshed.
    pub fn touch(&mut self, id: DeviceId) -> bool {
        self.touch_at(id, Instant::now())
    }

    pub(crate) fn touch_at(&mut self, id: DeviceId, now: Instant) -> bool {
        match self.devices.get_mut(&id) {
            Some(device) if device.paired => {
                device.touch_at(now);
                true
            }
            _ => false,
        }
    }

    /// Remove every device silent for longer than `timeout` as of `now`.
    ///
    /// Evicted entries are returned with `paired` cleared.
    pub fn evict_stale(&mut self, now: Instant, timeout: Duration) -> Vec<Device> {
        let stale: Vec<DeviceId> = self
            .devices
            .values()
            .filter(|device| device.silent_for(now) > timeout)
            .map(|device| device.id)
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.devices.remove(&id))
            .map(|mut device| {
                device.paired = false;
                info!(device = %device.id, silent_ms = device.silent_for(now).as_millis() as u64, "device timed out");
                device
            })
            .collect()
    }

    /// Whether `id` is present and paired.
    pub fn is_paired(&self, id: DeviceId) -> bool {
        self.devices.get(&id).is_some_and(|device| device.paired)
    }

    /// Copy of a single entry.
    pub fn get(&self, id: DeviceId) -> Option<Device> {
        self.devices.get(&id).cloned()
    }

    /// Copies of every paired entry, ordered by identity.
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices
            .values()
            .filter(|device| device.paired)
            .cloned()
            .collect()
    }

    /// Identities of every entry, ordered.
    pub fn list_identities(&self) -> Vec<DeviceId> {
        self.devices.keys().copied().collect()
    }

    /// Lowest known identity, if any.
    pub fn first_identity(&self) -> Option<DeviceId> {
        self.devices.keys().next().copied()
    }

    /// Whether any paired device is alive as of `now`.
    pub fn any_alive(&self, now: Instant, timeout: Duration) -> bool {
        self.devices
            .values()
            .any(|device| device.is_alive(now, timeout))
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(15);

    #[test]
    fn upsert_creates_then_updates() {
        let mut reg = DeviceRegistry::new();
        assert!(reg.upsert_on_pairing(DeviceId(1), 0xAA));
        assert!(!reg.upsert_on_pairing(DeviceId(1), 0xBB));

        let dev = reg.get(DeviceId(1)).unwrap();
        assert!(dev.paired);
        assert_eq!(dev.pairing_key, 0xBB);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn touch_ignores_unknown_devices() {
        let mut reg = DeviceRegistry::new();
        assert!(!reg.touch(DeviceId(9)));
        assert!(reg.is_empty());
    }

    #[test]
    fn touch_refreshes_last_seen() {
        let mut reg = DeviceRegistry::new();
        let start = Instant::now();
        reg.upsert_on_pairing_at(DeviceId(1), 1, start);

        let later = start + Duration::from_secs(10);
        assert!(reg.touch_at(DeviceId(1), later));
        assert_eq!(reg.get(DeviceId(1)).unwrap().last_seen, later);
    }

    #[test]
    fn evict_stale_removes_only_silent_devices() {
        let mut reg = DeviceRegistry::new();
        let start = Instant::now();
        reg.upsert_on_pairing_at(DeviceId(1), 1, start);
        reg.upsert_on_pairing_at(DeviceId(2), 2, start);
        reg.touch_at(DeviceId(2), start + Duration::from_secs(10));

        let evicted = reg.evict_stale(start + Duration::from_secs(16), TIMEOUT);

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, DeviceId(1));
        assert!(!evicted[0].paired);
        assert!(!reg.is_paired(DeviceId(1)));
        assert!(reg.is_paired(DeviceId(2)));
    }

    #[test]
    fn evict_keeps_device_at_exact_timeout() {
        let mut reg = DeviceRegistry::new();
        let start = Instant::now();
        reg.upsert_on_pairing_at(DeviceId(1), 1, start);

        assert!(reg.evict_stale(start + TIMEOUT, TIMEOUT).is_empty());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn queries_are_ordered_by_identity() {
        let mut reg = DeviceRegistry::new();
        reg.upsert_on_pairing(DeviceId(30), 0);
        reg.upsert_on_pairing(DeviceId(10), 0);
        reg.upsert_on_pairing(DeviceId(20), 0);

        assert_eq!(
            reg.list_identities(),
            vec![DeviceId(10), DeviceId(20), DeviceId(30)]
        );
        assert_eq!(reg.first_identity(), Some(DeviceId(10)));
        assert_eq!(reg.snapshot().len(), 3);
    }

    #[test]
    fn any_alive_tracks_liveness() {
        let mut reg = DeviceRegistry::new();
        let start = Instant::now();
        assert!(!reg.any_alive(start, TIMEOUT));

        reg.upsert_on_pairing_at(DeviceId(1), 1, start);
        assert!(reg.any_alive(start + Duration::from_secs(1), TIMEOUT));
        assert!(!reg.any_alive(start + Duration::from_secs(20), TIMEOUT));
    }
}
