//! Workload specifications and device compatibility

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceVendor};

/// Compute backend a workload implementation is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    Cuda,
    OpenCl,
}

impl ComputeBackend {
    /// Whether this backend can drive a device from the given vendor
    pub fn supports(&self, vendor: DeviceVendor) -> bool {
        match self {
            ComputeBackend::Cuda => vendor == DeviceVendor::Nvidia,
            ComputeBackend::OpenCl => matches!(
                vendor,
                DeviceVendor::Nvidia | DeviceVendor::Amd | DeviceVendor::Intel
            ),
        }
    }
}

impl std::fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeBackend::Cuda => write!(f, "CUDA"),
            ComputeBackend::OpenCl => write!(f, "OpenCL"),
        }
    }
}

/// Specification of a named computational workload
///
/// A workload is identified by its ordered, non-empty list of sub-algorithm
/// names. A single name is the common case; multi-algorithm configurations
/// (e.g. dual mining) combine several names into one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Ordered sub-algorithm names; identity of the workload
    pub names: Vec<String>,
    /// Backend the implementation targets
    pub backend: ComputeBackend,
}

impl WorkloadSpec {
    /// Create a workload spec
    ///
    /// Panics if `names` is empty; a workload with no sub-algorithms is
    /// not representable.
    pub fn new(names: Vec<String>, backend: ComputeBackend) -> Self {
        assert!(!names.is_empty(), "workload requires at least one algorithm name");
        Self { names, backend }
    }

    /// CUDA workload from a list of name literals
    pub fn cuda(names: &[&str]) -> Self {
        Self::new(names.iter().map(|n| n.to_string()).collect(), ComputeBackend::Cuda)
    }

    /// Registry ownership key: the sub-algorithm names joined with `_`
    pub fn key(&self) -> String {
        self.names.join("_")
    }

    /// Whether this workload's implementation can run on the device
    ///
    /// Pure predicate with no side effects; callers must filter device
    /// sets with this before assignment.
    pub fn accepts(&self, device: &Device) -> bool {
        self.backend.supports(device.vendor)
    }
}

impl std::fmt::Display for WorkloadSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
