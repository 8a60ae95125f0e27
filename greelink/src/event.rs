//! Session event surface
//!
//! The driver reports its life through these events on an unbounded
//! channel. They are fire-and-forget notifications: the driver never waits
//! on the receiver, and dropping the receiver simply discards them.

use crate::error::Error;

/// What happened inside a session
#[derive(Debug)]
pub enum Event {
    /// The appliance acknowledged the bind; polling has started
    Connected,

    /// A status reply was merged into the property map
    Status,

    /// A command reply was merged into the property map
    Update,

    /// A non-fatal protocol error: unreadable response, phase-inappropriate
    /// payload, or a failed send. The session stays in its current phase.
    Error(Error),

    /// The local socket could not be bound; a retry is scheduled
    Disconnected,
}
