//! Device information structures

use std::fmt;

/// Identity of an appliance, learned once during the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Stable appliance identifier
    pub id: String,

    /// Human-readable name (user-assigned on the appliance)
    pub name: Option<String>,

    /// Firmware version string
    pub firmware: Option<String>,
}

impl DeviceInfo {
    pub fn new(id: String, name: Option<String>, firmware: Option<String>) -> Self {
        Self { id, name, firmware }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[{}, name: {}, FW: {}]",
            self.id,
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.firmware.as_deref().unwrap_or("<unknown>")
        )
    }
}
