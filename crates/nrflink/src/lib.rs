//! Point-to-multipoint pairing and reliable delivery for 2.4GHz radio links.
//!
//! nrflink lets many transmitters pair with a receiver by identity, send
//! heartbeats and acknowledged data over frames of at most 128 bytes, and
//! lets the receiver track which transmitters are still alive.
//!
//! # Crate Structure
//!
//! - [`radio`]: Radio driver abstraction and a simulated air medium
//! - [`frame`]: Wire format: CRC-protected, terminator-delimited frames
//! - [`peer`]: Transmitter, receiver and device registry (behind `peer` feature)

/// Re-export radio types.
pub mod radio {
    pub use nrflink_radio::*;
}

/// Re-export frame types.
pub mod frame {
    pub use nrflink_frame::*;
}

/// Re-export link types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use nrflink_peer::*;
}
