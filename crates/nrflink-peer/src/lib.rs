//! Point-to-multipoint link layer over a [`RadioDriver`](nrflink_radio::RadioDriver).
//!
//! A [`Transmitter`] pairs with one [`Receiver`] by identity and then sends
//! heartbeats and data to it, optionally waiting for acknowledgements. A
//! receiver accepts pairings from many transmitters and tracks their
//! liveness, evicting devices that fall silent.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod config;
pub mod device;
pub mod error;
pub mod pairing;
pub mod receiver;
pub mod registry;
pub mod transmitter;
mod worker;

pub use config::{ReceiverConfig, TransmitterConfig};
pub use device::{Device, DeviceRole};
pub use error::{LinkError, Result};
pub use pairing::{generate_pairing_key, PairingRequest};
pub use receiver::{Disposition, FrameCallback, Receiver};
pub use registry::DeviceRegistry;
pub use transmitter::Transmitter;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
