//! Device descriptors
//!
//! Devices are enumerated by an external collaborator and passed in by
//! value; the engine never probes hardware itself.

use serde::{Deserialize, Serialize};

/// Represents a physical compute device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable vendor-format identifier (e.g. "GPU-8f6552ab-...")
    pub uuid: String,
    /// Human-readable device name
    pub name: String,
    /// Device vendor
    pub vendor: DeviceVendor,
}

impl Device {
    /// Create a new device descriptor
    pub fn new(uuid: impl Into<String>, name: impl Into<String>, vendor: DeviceVendor) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            vendor,
        }
    }
}

/// Device vendor types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceVendor {
    Nvidia,
    Amd,
    Intel,
    Unknown,
}

impl std::fmt::Display for DeviceVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceVendor::Nvidia => write!(f, "NVIDIA"),
            DeviceVendor::Amd => write!(f, "AMD"),
            DeviceVendor::Intel => write!(f, "Intel"),
            DeviceVendor::Unknown => write!(f, "Unknown"),
        }
    }
}
