use std::sync::Arc;
use std::time::Duration;

use crate::error::{RadioError, Result};

/// Highest RF channel the transceiver supports (2400 MHz + 125).
pub const MAX_CHANNEL: u8 = 125;

/// Raw transceiver primitives consumed by the link layer.
///
/// Implementations are shared between a background receive loop, a
/// periodic maintenance task and application threads, so every method takes
/// `&self` and implementations synchronize internally. Hardware drivers
/// typically wrap their peripheral in a mutex; [`SimRadio`](crate::SimRadio)
/// uses a condition-variable inbox.
pub trait RadioDriver: Send + Sync {
    /// Bring the radio's timing source up. Assumed to eventually complete.
    fn start_clock(&self);

    /// One-time radio setup: base address, address prefix and RF channel.
    fn configure(&self, address: u32, prefix: u8, channel: u8) -> Result<()>;

    /// Retune to `channel` (0-125).
    fn set_channel(&self, channel: u8) -> Result<()>;

    /// Send one frame's worth of bytes, blocking until on-air completion.
    fn transmit(&self, bytes: &[u8]) -> Result<()>;

    /// Block up to `timeout` for one inbound frame.
    ///
    /// Returns `Err(RadioError::Timeout)` when nothing arrives.
    fn receive(&self, timeout: Duration) -> Result<Vec<u8>>;
}

impl<D: RadioDriver + ?Sized> RadioDriver for Arc<D> {
    fn start_clock(&self) {
        (**self).start_clock()
    }

    fn configure(&self, address: u32, prefix: u8, channel: u8) -> Result<()> {
        (**self).configure(address, prefix, channel)
    }

    fn set_channel(&self, channel: u8) -> Result<()> {
        (**self).set_channel(channel)
    }

    fn transmit(&self, bytes: &[u8]) -> Result<()> {
        (**self).transmit(bytes)
    }

    fn receive(&self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).receive(timeout)
    }
}

/// Reject channels outside 0-125.
pub fn validate_channel(channel: u8) -> Result<()> {
    if channel > MAX_CHANNEL {
        return Err(RadioError::InvalidChannel(channel));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_bounds() {
        assert!(validate_channel(0).is_ok());
        assert!(validate_channel(MAX_CHANNEL).is_ok());
        assert!(matches!(
            validate_channel(126),
            Err(RadioError::InvalidChannel(126))
        ));
        assert!(matches!(
            validate_channel(u8::MAX),
            Err(RadioError::InvalidChannel(255))
        ));
    }
}
