//! Engine façade
//!
//! Wires the supervisor, protocol client, registry and per-workload
//! handles together. All handles share one client, one registry and one
//! lock table; the engine owns their lifecycle.

use std::sync::Arc;
use std::time::Duration;

use riglet_core::{MinerConfig, RigletResult, WorkloadSpec};
use riglet_protocol::ApiClient;
use riglet_runtime::{LoadOutcome, MinerRuntime, ProcessRuntime, ProcessSupervisor};
use tokio::sync::RwLock;

use crate::handle::AlgorithmHandle;
use crate::locks::DeviceLocks;
use crate::registry::WorkerRegistry;

/// State shared by the engine and every algorithm handle
pub(crate) struct EngineShared {
    pub(crate) client: Arc<ApiClient>,
    pub(crate) registry: RwLock<WorkerRegistry>,
    pub(crate) locks: DeviceLocks,
}

/// The assignment engine
///
/// Created with a workload catalog; one [`AlgorithmHandle`] per catalog
/// entry exists for the engine's lifetime. Nothing talks to the daemon
/// until [`load`](Engine::load).
pub struct Engine {
    shared: Arc<EngineShared>,
    supervisor: ProcessSupervisor,
    algorithms: Vec<Arc<AlgorithmHandle>>,
}

impl Engine {
    /// Create an engine that spawns the real daemon binary
    pub fn new(config: MinerConfig, catalog: Vec<WorkloadSpec>) -> Self {
        Self::with_runtime(config, catalog, Arc::new(ProcessRuntime))
    }

    /// Create an engine with a custom daemon runtime
    pub fn with_runtime(
        config: MinerConfig,
        catalog: Vec<WorkloadSpec>,
        runtime: Arc<dyn MinerRuntime>,
    ) -> Self {
        let client = Arc::new(ApiClient::new(Duration::from_secs(
            config.timeouts.command_secs,
        )));
        let shared = Arc::new(EngineShared {
            client: client.clone(),
            registry: RwLock::new(WorkerRegistry::new()),
            locks: DeviceLocks::new(),
        });
        let algorithms = catalog
            .into_iter()
            .map(|spec| Arc::new(AlgorithmHandle::new(spec, shared.clone())))
            .collect();
        let supervisor = ProcessSupervisor::new(config, runtime, client);

        Self {
            shared,
            supervisor,
            algorithms,
        }
    }

    /// Start the daemon (or reconnect to a running one) and get ready to
    /// accept assignments
    pub async fn load(&self) -> RigletResult<()> {
        if self.supervisor.load().await? == LoadOutcome::Spawned {
            // A fresh daemon instance has no workers.
            self.shared.registry.write().await.clear();
        }
        Ok(())
    }

    /// Shut the daemon down and forget all assignments
    pub async fn unload(&self) -> RigletResult<()> {
        let result = self.supervisor.unload().await;
        self.shared.registry.write().await.clear();
        result
    }

    /// Whether a daemon process is currently held
    pub async fn is_loaded(&self) -> bool {
        self.supervisor.is_loaded().await
    }

    /// Every workload handle, in catalog order
    pub fn algorithms(&self) -> &[Arc<AlgorithmHandle>] {
        &self.algorithms
    }

    /// Look a handle up by its exact sub-algorithm name list
    pub fn algorithm(&self, names: &[&str]) -> Option<Arc<AlgorithmHandle>> {
        self.algorithms
            .iter()
            .find(|a| {
                a.spec()
                    .names
                    .iter()
                    .map(String::as_str)
                    .eq(names.iter().copied())
            })
            .cloned()
    }

    /// The shared protocol client, for raw queries
    pub fn client(&self) -> Arc<ApiClient> {
        self.shared.client.clone()
    }

    /// The configuration the engine runs with
    pub fn config(&self) -> &MinerConfig {
        self.supervisor.config()
    }
}
