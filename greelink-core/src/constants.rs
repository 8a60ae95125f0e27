//! Protocol constants

use std::time::Duration;

/// UDP port the appliance listens on for discovery probes
pub const DISCOVERY_PORT: u16 = 7000;

/// Base for the deterministic local port: `8000 + last octet of the
/// appliance address`. One session per appliance per process never
/// collides with another.
pub const LOCAL_PORT_BASE: u16 = 8000;

/// Default status poll cadence once bound
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Delay before retrying a failed local socket bind
pub const REBIND_DELAY: Duration = Duration::from_secs(5);

/// Receive buffer size; the largest envelope the appliance emits is well
/// under this
pub const MAX_DATAGRAM: usize = 2048;

/// Expected length of every AES-128 key on this protocol
pub const KEY_LEN: usize = 16;
