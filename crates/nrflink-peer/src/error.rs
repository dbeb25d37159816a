use nrflink_radio::RadioError;

/// Errors surfaced at link API boundaries.
///
/// Frames that fail to decode inside the receive path never become errors;
/// they are dropped and polling continues.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Payload exceeds what one frame can carry.
    #[error("invalid payload size ({size} bytes, max {max})")]
    InvalidPayload { size: usize, max: usize },

    /// The operation requires a completed pairing handshake.
    #[error("device not paired")]
    NotPaired,

    /// A bounded wait expired.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Channel outside 0-125.
    #[error("invalid channel {0} (valid range: 0-125)")]
    InvalidChannel(u8),

    /// The radio driver failed.
    #[error("radio error: {0}")]
    Radio(RadioError),

    /// A background worker thread could not be started.
    #[error("failed to spawn worker: {0}")]
    Worker(#[from] std::io::Error),
}

impl From<RadioError> for LinkError {
    fn from(err: RadioError) -> Self {
        match err {
            RadioError::InvalidChannel(channel) => LinkError::InvalidChannel(channel),
            RadioError::Timeout(after) => LinkError::Timeout(after),
            other => LinkError::Radio(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn radio_errors_map_to_link_kinds() {
        assert!(matches!(
            LinkError::from(RadioError::InvalidChannel(200)),
            LinkError::InvalidChannel(200)
        ));
        assert!(matches!(
            LinkError::from(RadioError::Timeout(Duration::from_millis(5))),
            LinkError::Timeout(_)
        ));
        assert!(matches!(
            LinkError::from(RadioError::Shutdown),
            LinkError::Radio(RadioError::Shutdown)
        ));
    }
}
