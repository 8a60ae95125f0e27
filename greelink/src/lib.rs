//! # greelink
//!
//! Async driver for Gree-compatible network climate appliances.
//!
//! The appliance speaks a proprietary UDP protocol: a bare discovery
//! probe, then encrypted envelopes for the handshake, key-exchange bind,
//! status polling and commands. Two encryption schemes exist in the field
//! (unauthenticated ECB before V2 firmware, authenticated GCM after) and
//! are negotiated automatically from the handshake reply.
//!
//! ## Quick Start
//!
//! ```no_run
//! use greelink::{CommandTable, DeviceConfig, Event};
//!
//! #[tokio::main]
//! async fn main() -> greelink::Result<()> {
//!     let table = CommandTable::new()
//!         .define_with_values("power", "Pow", [("off", 0), ("on", 1)])
//!         .define("temperature", "SetTem");
//!
//!     let (device, mut events) = DeviceConfig::new("192.168.1.60".parse().unwrap())
//!         .with_poll_columns(table.codes())
//!         .connect();
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             Event::Connected => println!("bound to {:?}", device.info()),
//!             Event::Status => println!("{:?}", device.properties()),
//!             other => println!("{other:?}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! One session drives one appliance; run several sessions for several
//! appliances, each with its own socket and no shared state.

pub mod device;
pub mod error;
pub mod event;

// Re-exports
pub use device::{Device, DeviceConfig};
pub use error::{Error, Result};
pub use event::Event;

// Re-export types
pub use greelink_core::{CipherContext, Envelope, Payload, Phase, Scheme, Session};
pub use greelink_types::{CommandTable, DeviceInfo, PropertySpec};
