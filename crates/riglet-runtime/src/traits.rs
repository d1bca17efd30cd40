//! Runtime trait definitions

use async_trait::async_trait;
use riglet_core::{MinerConfig, RigletResult};
use std::net::SocketAddr;

/// Runtime trait for launching the miner daemon
#[async_trait]
pub trait MinerRuntime: Send + Sync {
    /// Spawn the daemon process described by the configuration
    async fn spawn(&self, config: &MinerConfig) -> RigletResult<Box<dyn MinerProcess>>;

    /// Get the runtime name
    fn name(&self) -> &'static str;
}

/// Handle to a spawned miner daemon process
#[async_trait]
pub trait MinerProcess: Send + Sync {
    /// Address of the daemon's command socket
    fn api_addr(&self) -> SocketAddr;

    /// Whether the process is still alive
    async fn is_running(&mut self) -> bool;

    /// Terminate the process, forcefully if it does not exit in time
    async fn shutdown(&mut self) -> RigletResult<()>;
}
