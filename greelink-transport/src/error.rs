//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The deterministic local port could not be bound; the driver retries
    /// this indefinitely
    #[error("could not bind local control port: {0}")]
    Bind(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
