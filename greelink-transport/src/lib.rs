//! Transport layer for the appliance control protocol
//!
//! One UDP socket per session, bound to a local port derived from the
//! appliance address.

pub mod error;
pub mod udp;

pub use error::{Error, Result};
pub use udp::UdpLink;
