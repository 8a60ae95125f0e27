//! # greelink-core
//!
//! Core protocol implementation for Gree-compatible network climate
//! appliances.
//!
//! This crate provides the low-level protocol primitives:
//! - Encryption codec (legacy ECB and authenticated GCM schemes)
//! - Wire envelope structure and encoding/decoding
//! - Inner payload model
//! - Session state
//! - Protocol constants

pub mod constants;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod payload;
pub mod session;

pub use crypto::{CipherContext, Scheme};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use payload::Payload;
pub use session::{Phase, Session};
