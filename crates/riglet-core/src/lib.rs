//! riglet-core: Core types for the riglet assignment engine
//!
//! This crate provides the fundamental types used throughout riglet:
//! - Device descriptors and vendor tags
//! - Workload specifications and device compatibility
//! - Configuration types
//! - Error handling

pub mod config;
pub mod device;
pub mod error;
pub mod workload;

pub use config::*;
pub use device::*;
pub use error::*;
pub use workload::*;
