//! Miner daemon supervision
//!
//! The supervisor owns the daemon process and the client connection as one
//! resource: `load` spawns the process and connects, `unload` asks for a
//! clean shutdown and tears both down. It is safe to `unload` after a
//! partially failed `load`, and a fresh `load` after `unload` fully
//! re-establishes state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use riglet_core::{MinerConfig, RigletError, RigletResult};
use riglet_protocol::ApiClient;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::traits::{MinerProcess, MinerRuntime};

/// What a successful [`ProcessSupervisor::load`] actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Daemon already running with a live connection; nothing changed
    Running,
    /// Daemon already running; the connection was re-established
    Reconnected,
    /// A fresh daemon instance was spawned and connected
    Spawned,
}

/// Supervises the miner daemon process and the command socket connection
pub struct ProcessSupervisor {
    config: MinerConfig,
    runtime: Arc<dyn MinerRuntime>,
    client: Arc<ApiClient>,
    process: Mutex<Option<Box<dyn MinerProcess>>>,
}

impl ProcessSupervisor {
    /// Create a supervisor; nothing is spawned until [`load`](Self::load)
    pub fn new(config: MinerConfig, runtime: Arc<dyn MinerRuntime>, client: Arc<ApiClient>) -> Self {
        Self {
            config,
            runtime,
            client,
            process: Mutex::new(None),
        }
    }

    /// The configuration this supervisor runs with
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Whether a daemon process is currently held
    pub async fn is_loaded(&self) -> bool {
        self.process.lock().await.is_some()
    }

    /// Spawn the daemon (if not already running) and connect the client,
    /// blocking until the daemon accepts commands or the startup deadline
    /// passes
    ///
    /// When the held daemon is still alive but the connection was lost
    /// (e.g. after a command timeout), this reconnects to the same
    /// instance instead of spawning a new one.
    pub async fn load(&self) -> RigletResult<LoadOutcome> {
        let mut slot = self.process.lock().await;

        if let Some(process) = slot.as_mut() {
            if process.is_running().await {
                if self.client.is_connected().await {
                    return Ok(LoadOutcome::Running);
                }
                let addr = process.api_addr();
                self.connect_with_deadline(addr).await?;
                info!(addr = %addr, "Reconnected to running miner daemon");
                return Ok(LoadOutcome::Reconnected);
            }
            // The daemon died underneath us; discard the stale handle.
            warn!(runtime = self.runtime.name(), "Held daemon process is gone");
            let _ = process.shutdown().await;
            *slot = None;
            self.client.disconnect().await;
        }

        let mut process = self.runtime.spawn(&self.config).await?;

        match self.connect_with_deadline(process.api_addr()).await {
            Ok(()) => {
                info!(addr = %process.api_addr(), "Miner daemon ready");
                *slot = Some(process);
                Ok(LoadOutcome::Spawned)
            }
            Err(e) => {
                if let Err(kill_err) = process.shutdown().await {
                    warn!(error = %kill_err, "Failed to stop daemon after connect failure");
                }
                Err(e)
            }
        }
    }

    async fn connect_with_deadline(&self, addr: SocketAddr) -> RigletResult<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.timeouts.startup_secs);
        loop {
            match self.client.connect(addr).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(RigletError::Process(format!(
                            "daemon not ready within {}s: {}",
                            self.config.timeouts.startup_secs, e
                        )));
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }
    }

    /// Ask the daemon to shut down cleanly, then terminate it and release
    /// the connection
    pub async fn unload(&self) -> RigletResult<()> {
        let mut slot = self.process.lock().await;

        if self.client.is_connected().await {
            if let Err(e) = self.client.quit().await {
                warn!(error = %e, "Clean shutdown command failed");
            }
        }
        self.client.disconnect().await;

        if let Some(mut process) = slot.take() {
            // Give the quit command a chance before killing.
            let deadline =
                Instant::now() + Duration::from_secs(self.config.timeouts.shutdown_secs);
            while process.is_running().await && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            process.shutdown().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Runtime whose "daemon" is an in-process socket acknowledging every
    /// command.
    struct MockRuntime {
        spawn_count: AtomicU32,
    }

    impl MockRuntime {
        fn new() -> Self {
            Self {
                spawn_count: AtomicU32::new(0),
            }
        }
    }

    struct MockProcess {
        addr: SocketAddr,
        alive: Arc<AtomicBool>,
        task: tokio::task::JoinHandle<()>,
    }

    #[async_trait]
    impl MinerRuntime for MockRuntime {
        async fn spawn(&self, _config: &MinerConfig) -> RigletResult<Box<dyn MinerProcess>> {
            self.spawn_count.fetch_add(1, Ordering::SeqCst);
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let task = tokio::spawn(async move {
                loop {
                    let (stream, _) = match listener.accept().await {
                        Ok(conn) => conn,
                        Err(_) => return,
                    };
                    let (read, mut write) = stream.into_split();
                    let mut reader = BufReader::new(read);
                    let mut line = String::new();
                    while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
                        let id = value["id"].as_u64().unwrap();
                        let reply = format!("{{\"id\":{},\"error\":null}}\n", id);
                        if write.write_all(reply.as_bytes()).await.is_err() {
                            return;
                        }
                        line.clear();
                    }
                }
            });
            Ok(Box::new(MockProcess {
                addr,
                alive: Arc::new(AtomicBool::new(true)),
                task,
            }))
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    #[async_trait]
    impl MinerProcess for MockProcess {
        fn api_addr(&self) -> SocketAddr {
            self.addr
        }

        async fn is_running(&mut self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn shutdown(&mut self) -> RigletResult<()> {
            self.alive.store(false, Ordering::SeqCst);
            self.task.abort();
            Ok(())
        }
    }

    /// Runtime whose process never opens a command socket.
    struct DeafRuntime;

    struct DeafProcess {
        addr: SocketAddr,
    }

    #[async_trait]
    impl MinerRuntime for DeafRuntime {
        async fn spawn(&self, _config: &MinerConfig) -> RigletResult<Box<dyn MinerProcess>> {
            // A port that was bound and released; nothing listens there.
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            Ok(Box::new(DeafProcess { addr }))
        }

        fn name(&self) -> &'static str {
            "deaf"
        }
    }

    #[async_trait]
    impl MinerProcess for DeafProcess {
        fn api_addr(&self) -> SocketAddr {
            self.addr
        }

        async fn is_running(&mut self) -> bool {
            false
        }

        async fn shutdown(&mut self) -> RigletResult<()> {
            Ok(())
        }
    }

    fn test_config() -> MinerConfig {
        let mut config = MinerConfig::default();
        config.timeouts.startup_secs = 0;
        config.timeouts.shutdown_secs = 0;
        config
    }

    #[tokio::test]
    async fn test_load_unload_cycle() {
        let client = Arc::new(ApiClient::new(Duration::from_secs(1)));
        let supervisor =
            ProcessSupervisor::new(test_config(), Arc::new(MockRuntime::new()), client.clone());

        assert_eq!(supervisor.load().await.unwrap(), LoadOutcome::Spawned);
        assert!(supervisor.is_loaded().await);
        assert!(client.is_connected().await);

        supervisor.unload().await.unwrap();
        assert!(!supervisor.is_loaded().await);
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_load_is_reentrant_while_running() {
        let client = Arc::new(ApiClient::new(Duration::from_secs(1)));
        let runtime = Arc::new(MockRuntime::new());
        let supervisor = ProcessSupervisor::new(test_config(), runtime.clone(), client);

        assert_eq!(supervisor.load().await.unwrap(), LoadOutcome::Spawned);
        assert_eq!(supervisor.load().await.unwrap(), LoadOutcome::Running);
        assert_eq!(runtime.spawn_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconnect_to_running_daemon() {
        let client = Arc::new(ApiClient::new(Duration::from_secs(1)));
        let runtime = Arc::new(MockRuntime::new());
        let supervisor = ProcessSupervisor::new(test_config(), runtime.clone(), client.clone());

        supervisor.load().await.unwrap();
        client.disconnect().await;

        assert_eq!(supervisor.load().await.unwrap(), LoadOutcome::Reconnected);
        assert_eq!(runtime.spawn_count.load(Ordering::SeqCst), 1);
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_reload_after_unload() {
        let client = Arc::new(ApiClient::new(Duration::from_secs(1)));
        let runtime = Arc::new(MockRuntime::new());
        let supervisor = ProcessSupervisor::new(test_config(), runtime.clone(), client.clone());

        supervisor.load().await.unwrap();
        supervisor.unload().await.unwrap();
        assert_eq!(supervisor.load().await.unwrap(), LoadOutcome::Spawned);

        assert_eq!(runtime.spawn_count.load(Ordering::SeqCst), 2);
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_nothing_behind() {
        let client = Arc::new(ApiClient::new(Duration::from_secs(1)));
        let supervisor = ProcessSupervisor::new(test_config(), Arc::new(DeafRuntime), client.clone());

        let err = supervisor.load().await.unwrap_err();
        assert!(matches!(err, RigletError::Process(_)));
        assert!(!supervisor.is_loaded().await);
        assert!(!client.is_connected().await);

        // unload after a failed load is a no-op, not an error
        supervisor.unload().await.unwrap();
    }
}
