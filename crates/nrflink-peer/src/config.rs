use std::time::Duration;

use nrflink_frame::constants::{
    ACK_POLL, ACK_WINDOW, BACKOFF_BASE, BACKOFF_STEP, CLEANUP_INTERVAL, DEVICE_TIMEOUT,
    HEARTBEAT_INTERVAL, PAIRING_TIMEOUT, RECEIVE_DATA_TIMEOUT, RX_POLL,
};

/// Timing configuration for a [`Transmitter`](crate::Transmitter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitterConfig {
    /// Deadline for the pairing handshake. Default: 30 s.
    pub pairing_timeout: Duration,
    /// Ack wait after each reliable-send attempt. Default: 200 ms.
    pub ack_window: Duration,
    /// Receive timeout per poll inside an ack window. Default: 20 ms.
    pub ack_poll: Duration,
    /// Receive timeout per poll while pairing. Default: 100 ms.
    pub rx_poll: Duration,
    /// Heartbeat period of the background task. Default: 5 s.
    pub heartbeat_interval: Duration,
    /// Backoff before the second attempt. Default: 20 ms.
    pub backoff_base: Duration,
    /// Backoff growth per attempt. Default: 10 ms.
    pub backoff_step: Duration,
}

impl TransmitterConfig {
    /// Pause after the zero-based attempt `attempt` of a reliable send.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base + self.backoff_step * attempt
    }
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            pairing_timeout: PAIRING_TIMEOUT,
            ack_window: ACK_WINDOW,
            ack_poll: ACK_POLL,
            rx_poll: RX_POLL,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            backoff_base: BACKOFF_BASE,
            backoff_step: BACKOFF_STEP,
        }
    }
}

/// Timing configuration for a [`Receiver`](crate::Receiver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Deadline for receiver-side pairing. Default: 30 s.
    pub pairing_timeout: Duration,
    /// Deadline for a blocking `receive_data`. Default: 5 s.
    pub receive_timeout: Duration,
    /// Receive timeout per poll of the listening loop. Default: 100 ms.
    pub rx_poll: Duration,
    /// Silence after which a paired device is evicted. Default: 15 s.
    pub device_timeout: Duration,
    /// Cadence of the eviction pass. Default: 7.5 s.
    pub cleanup_interval: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            pairing_timeout: PAIRING_TIMEOUT,
            receive_timeout: RECEIVE_DATA_TIMEOUT,
            rx_poll: RX_POLL,
            device_timeout: DEVICE_TIMEOUT,
            cleanup_interval: CLEANUP_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly() {
        let cfg = TransmitterConfig::default();
        assert_eq!(cfg.backoff(0), Duration::from_millis(20));
        assert_eq!(cfg.backoff(1), Duration::from_millis(30));
        assert_eq!(cfg.backoff(4), Duration::from_millis(60));
    }

    #[test]
    fn receiver_cleanup_runs_at_half_device_timeout() {
        let cfg = ReceiverConfig::default();
        assert_eq!(cfg.cleanup_interval * 2, cfg.device_timeout);
    }
}
