//! Error types for greelink-core

/// Result type alias for core protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Encrypted pack is not valid base64
    #[error("invalid base64 in encrypted pack: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decryption failed (bad padding under ECB, tag mismatch under GCM)
    #[error("pack failed decryption")]
    Cipher,

    /// The envelope advertises the authenticated scheme but carries no tag
    #[error("authenticated pack is missing its tag")]
    MissingTag,

    /// Wire bytes or decrypted plaintext are not the JSON we expect
    #[error("malformed JSON on the wire: {0}")]
    Json(#[from] serde_json::Error),

    /// A well-formed payload whose type is not valid right now
    #[error("unexpected payload type `{0}`")]
    UnexpectedPayload(String),

    /// Session key from the appliance has the wrong length
    #[error("session key must be {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    /// Session state transition not allowed from the current phase
    #[error("invalid session phase: {0}")]
    InvalidPhase(String),
}

impl Error {
    /// Check whether this error means "unreadable response".
    ///
    /// Every decode-class failure (base64, decryption, JSON parse) is
    /// handled the same way by the state machine: report and wait for the
    /// next datagram.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::Base64(_) | Self::Cipher | Self::MissingTag | Self::Json(_)
        )
    }
}
