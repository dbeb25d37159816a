use std::time::Duration;

/// Errors reported by radio drivers.
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// The channel is outside the supported 0-125 range.
    #[error("invalid channel {0} (valid range: 0-125)")]
    InvalidChannel(u8),

    /// No inbound frame arrived within the receive window.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),

    /// The driver failed to put a frame on air.
    #[error("transmit failed: {0}")]
    Transmit(String),

    /// An I/O error occurred on a host-backed driver.
    #[error("radio I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The radio has been detached from its medium.
    #[error("radio shut down")]
    Shutdown,
}

impl RadioError {
    /// Whether this error only means "nothing arrived yet".
    pub fn is_timeout(&self) -> bool {
        matches!(self, RadioError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, RadioError>;
