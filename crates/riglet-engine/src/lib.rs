//! riglet-engine: device-to-worker assignment engine
//!
//! This crate decides which device runs which workload and keeps the
//! external miner daemon converged on that decision:
//! - Worker registry mirroring daemon worker state
//! - Per-device mutual exclusion for concurrent assignment calls
//! - Algorithm handles implementing set-of-devices reconciliation
//! - The engine façade owning the daemon lifecycle

pub mod catalog;
pub mod engine;
pub mod handle;
pub mod locks;
pub mod registry;

pub use catalog::default_catalog;
pub use engine::Engine;
pub use handle::AlgorithmHandle;
pub use locks::DeviceLocks;
pub use registry::{WorkerEntry, WorkerRegistry, WorkloadKey};
