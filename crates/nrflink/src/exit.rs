use std::fmt;

use nrflink_frame::FrameError;
use nrflink_peer::LinkError;
use nrflink_radio::RadioError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn radio_error(context: &str, err: RadioError) -> CliError {
    let code = match err {
        RadioError::InvalidChannel(_) => USAGE,
        RadioError::Timeout(_) => TIMEOUT,
        RadioError::Io(_) => INTERNAL,
        RadioError::Transmit(_) | RadioError::Shutdown => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Radio(err) => radio_error(context, err),
        LinkError::InvalidPayload { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        LinkError::InvalidChannel(_) => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::NotPaired => CliError::new(FAILURE, format!("{context}: {err}")),
        LinkError::Worker(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn link_errors_map_to_exit_codes() {
        assert_eq!(link_error("x", LinkError::NotPaired).code, FAILURE);
        assert_eq!(
            link_error("x", LinkError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(
            link_error("x", LinkError::InvalidPayload { size: 200, max: 113 }).code,
            DATA_INVALID
        );
        assert_eq!(
            link_error("x", LinkError::Radio(RadioError::Shutdown)).code,
            TRANSPORT_ERROR
        );
        assert_eq!(link_error("x", LinkError::InvalidChannel(200)).code, USAGE);
    }

    #[test]
    fn frame_errors_are_data_invalid() {
        let err = frame_error("decode failed", FrameError::MissingTerminator(0xAA));
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode failed: "));
    }
}
