//! Process-based runtime implementation
//!
//! Spawns the miner daemon binary as a direct OS child process and
//! controls it through its pid.

use async_trait::async_trait;
use riglet_core::{MinerConfig, RigletError, RigletResult};
use std::net::SocketAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, info};

use crate::traits::{MinerProcess, MinerRuntime};

/// Process-based runtime for the miner daemon
pub struct ProcessRuntime;

impl ProcessRuntime {
    /// Build the command to start the daemon
    fn build_command(config: &MinerConfig) -> Command {
        let mut cmd = Command::new(&config.binary_path);

        cmd.arg("--config-dir").arg(&config.config_dir);
        cmd.arg("--api-bind")
            .arg(format!("{}:{}", config.api.address, config.api.port));

        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        cmd
    }
}

#[async_trait]
impl MinerRuntime for ProcessRuntime {
    async fn spawn(&self, config: &MinerConfig) -> RigletResult<Box<dyn MinerProcess>> {
        let addr: SocketAddr = format!("{}:{}", config.api.address, config.api.port)
            .parse()
            .map_err(|e| RigletError::Config(format!("invalid api address: {}", e)))?;

        info!(
            binary = %config.binary_path.display(),
            addr = %addr,
            "Starting miner daemon"
        );

        let mut cmd = Self::build_command(config);
        match cmd.spawn() {
            Ok(child) => {
                debug!(pid = child.id().unwrap_or(0), "Miner daemon spawned");
                Ok(Box::new(DaemonProcess {
                    child,
                    addr,
                    shutdown_timeout: Duration::from_secs(config.timeouts.shutdown_secs),
                }))
            }
            Err(e) => {
                error!(
                    binary = %config.binary_path.display(),
                    error = %e,
                    "Failed to spawn miner daemon"
                );
                Err(RigletError::Process(format!(
                    "Failed to spawn miner daemon: {}",
                    e
                )))
            }
        }
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// A spawned miner daemon child process
struct DaemonProcess {
    child: Child,
    addr: SocketAddr,
    shutdown_timeout: Duration,
}

#[async_trait]
impl MinerProcess for DaemonProcess {
    fn api_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn shutdown(&mut self) -> RigletResult<()> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(status = %status, "Miner daemon already exited");
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => return Err(RigletError::Process(format!("try_wait failed: {}", e))),
        }

        self.child
            .start_kill()
            .map_err(|e| RigletError::Process(format!("kill failed: {}", e)))?;

        match tokio::time::timeout(self.shutdown_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(status = %status, "Miner daemon terminated");
                Ok(())
            }
            Ok(Err(e)) => Err(RigletError::Process(format!("wait failed: {}", e))),
            Err(_) => Err(RigletError::Process(
                "miner daemon did not exit after kill".to_string(),
            )),
        }
    }
}
