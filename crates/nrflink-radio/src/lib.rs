//! Radio driver abstraction for short-range 2.4GHz transceivers.
//!
//! Provides the capability the link layer consumes:
//! - [`RadioDriver`]: clock startup, addressing, channel selection, raw tx/rx
//! - [`SimAir`] / [`SimRadio`]: a host-side shared medium for tests and demos
//!
//! This is the lowest layer of nrflink. Register-level peripheral programming
//! lives behind [`RadioDriver`] implementations outside this workspace.

pub mod error;
pub mod sim;
pub mod traits;

pub use error::{RadioError, Result};
pub use sim::{SimAir, SimRadio, RX_FIFO_DEPTH};
pub use traits::{validate_channel, RadioDriver, MAX_CHANNEL};
