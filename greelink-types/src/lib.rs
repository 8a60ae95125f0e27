//! Type definitions for greelink

pub mod commands;
pub mod device_info;
pub mod error;

pub use commands::{CommandTable, PropertySpec};
pub use device_info::DeviceInfo;
pub use error::{Error, Result};
