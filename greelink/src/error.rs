//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("protocol error: {0}")]
    Core(#[from] greelink_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] greelink_transport::Error),

    #[error("command table error: {0}")]
    Table(#[from] greelink_types::Error),

    /// Status and command traffic is refused until the appliance has
    /// acknowledged the bind
    #[error("appliance is not bound yet")]
    NotBound,

    /// The driver task is gone (session was torn down)
    #[error("session driver has shut down")]
    Closed,
}
