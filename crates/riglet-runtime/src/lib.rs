//! riglet-runtime: Miner daemon process supervision
//!
//! This crate owns the lifecycle of the external miner daemon:
//! - Runtime traits for spawning and controlling the daemon process
//! - The process-based runtime implementation
//! - The supervisor tying process lifetime to the client connection

pub mod process;
pub mod supervisor;
pub mod traits;

pub use process::ProcessRuntime;
pub use supervisor::{LoadOutcome, ProcessSupervisor};
pub use traits::{MinerProcess, MinerRuntime};
