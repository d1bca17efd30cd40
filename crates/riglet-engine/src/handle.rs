//! Per-workload assignment façade
//!
//! An [`AlgorithmHandle`] accepts a desired device set and drives the
//! registry and the protocol client until the daemon runs this workload
//! on exactly that set. Devices are exclusive: claiming a device another
//! workload owns evicts that worker first (last writer wins).

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use riglet_core::{Device, RigletError, RigletResult, WorkloadSpec};
use riglet_protocol::WorkerAlgorithm;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::engine::EngineShared;
use crate::registry::WorkerEntry;

/// Caller-facing handle for one workload
pub struct AlgorithmHandle {
    spec: WorkloadSpec,
    benchmarking: AtomicBool,
    desired: Mutex<Vec<Device>>,
    shared: Arc<EngineShared>,
}

impl AlgorithmHandle {
    pub(crate) fn new(spec: WorkloadSpec, shared: Arc<EngineShared>) -> Self {
        Self {
            spec,
            benchmarking: AtomicBool::new(false),
            desired: Mutex::new(Vec::new()),
            shared,
        }
    }

    /// The workload this handle assigns
    pub fn spec(&self) -> &WorkloadSpec {
        &self.spec
    }

    /// Whether this workload's implementation can run on the device
    pub fn accepts(&self, device: &Device) -> bool {
        self.spec.accepts(device)
    }

    /// Whether speed samples from this workload are calibration samples
    ///
    /// Purely a marker for telemetry consumers; it never changes which
    /// commands reconciliation issues.
    pub fn benchmarking(&self) -> bool {
        self.benchmarking.load(Ordering::Relaxed)
    }

    /// Flip the benchmarking marker
    pub fn set_benchmarking(&self, on: bool) {
        self.benchmarking.store(on, Ordering::Relaxed);
    }

    /// The device set most recently passed to [`set_devices`](Self::set_devices)
    pub async fn desired_devices(&self) -> Vec<Device> {
        self.desired.lock().await.clone()
    }

    /// Make the daemon run this workload on exactly the given devices
    ///
    /// Every device must satisfy [`accepts`](Self::accepts); passing an
    /// incompatible device is a contract violation and panics. Devices
    /// held by another workload are evicted before being claimed.
    /// Calling twice with the same set issues no remote commands on the
    /// second call.
    pub async fn set_devices(&self, devices: &[Device]) -> RigletResult<()> {
        for device in devices {
            assert!(
                self.spec.accepts(device),
                "device {} ({}) is incompatible with workload {}; filter with accepts() first",
                device.uuid,
                device.vendor,
                self.spec,
            );
        }

        let key = self.spec.key();
        let desired: BTreeSet<String> = devices.iter().map(|d| d.uuid.clone()).collect();
        *self.desired.lock().await = devices.to_vec();

        // Hold every device this call may touch: the desired set plus
        // whatever this workload currently owns. Ownership can shift
        // while waiting on the locks, so widen and retry until stable.
        let _guards = loop {
            let mut scope = desired.clone();
            scope.extend(self.shared.registry.read().await.devices_owned_by(&key));
            let guards = self.shared.locks.acquire(&scope).await;
            let owned = self.shared.registry.read().await.devices_owned_by(&key);
            if owned.iter().all(|uuid| scope.contains(uuid)) {
                break guards;
            }
        };

        self.verify_scope(&desired).await?;

        let (to_remove, to_evict, to_add) = {
            let registry = self.shared.registry.read().await;

            let mut to_remove: Vec<(String, WorkerEntry)> = Vec::new();
            for uuid in registry.devices_owned_by(&key) {
                if !desired.contains(&uuid) {
                    if let Some(entry) = registry.get(&uuid) {
                        to_remove.push((uuid.clone(), entry.clone()));
                    }
                }
            }

            let mut to_evict: Vec<(String, WorkerEntry)> = Vec::new();
            let mut to_add: Vec<String> = Vec::new();
            for uuid in &desired {
                match registry.get(uuid) {
                    Some(entry) if entry.owner.as_deref() == Some(key.as_str()) => {}
                    Some(entry) => to_evict.push((uuid.clone(), entry.clone())),
                    None => to_add.push(uuid.clone()),
                }
            }

            (to_remove, to_evict, to_add)
        };

        if to_remove.is_empty() && to_evict.is_empty() && to_add.is_empty() {
            debug!(workload = %key, "Assignment already converged");
            return Ok(());
        }

        info!(
            workload = %key,
            remove = to_remove.len(),
            evict = to_evict.len(),
            add = to_add.len(),
            "Reconciling device assignment"
        );

        for (uuid, entry) in &to_remove {
            self.teardown(uuid, entry).await?;
        }
        for (uuid, entry) in &to_evict {
            self.teardown(uuid, entry).await?;
        }
        for uuid in to_evict.iter().map(|(uuid, _)| uuid).chain(to_add.iter()) {
            self.bring_up(uuid).await?;
        }

        Ok(())
    }

    /// Speeds for every device this workload currently owns
    ///
    /// Empty when nothing is assigned; otherwise one entry per owned
    /// device, keyed by device uuid.
    pub async fn current_speeds(&self) -> RigletResult<HashMap<String, Vec<WorkerAlgorithm>>> {
        let key = self.spec.key();
        let owned: BTreeSet<String> = {
            let registry = self.shared.registry.read().await;
            registry.devices_owned_by(&key).into_iter().collect()
        };
        if owned.is_empty() {
            return Ok(HashMap::new());
        }

        let workers = self.shared.client.worker_list().await?;
        Ok(workers
            .into_iter()
            .filter(|w| owned.contains(&w.device_uuid))
            .map(|w| (w.device_uuid, w.algorithms))
            .collect())
    }

    /// Re-verify any scoped registry entry whose remote state is unknown
    /// against a fresh `worker.list` before planning mutations.
    async fn verify_scope(&self, desired: &BTreeSet<String>) -> RigletResult<()> {
        let key = self.spec.key();
        let unverified = {
            let registry = self.shared.registry.read().await;
            let mut scope = desired.clone();
            scope.extend(registry.devices_owned_by(&key));
            registry.unverified_in(scope.iter())
        };
        if unverified.is_empty() {
            return Ok(());
        }

        debug!(devices = ?unverified, "Re-verifying registry entries against worker.list");
        let workers = self.shared.client.worker_list().await?;

        let mut registry = self.shared.registry.write().await;
        for uuid in unverified {
            let observed = workers.iter().find(|w| w.device_uuid == uuid).map(|w| {
                (
                    w.worker_id,
                    w.algorithms.iter().map(|a| a.name.clone()).collect(),
                )
            });
            registry.apply_observation(&uuid, observed);
        }
        Ok(())
    }

    /// Detach and free a device's worker, committing each confirmed step
    async fn teardown(&self, uuid: &str, entry: &WorkerEntry) -> RigletResult<()> {
        let Some(worker_id) = entry.worker_id else {
            // Scoped entries are verified before planning; an id-less
            // entry here means the device state is not trustworthy.
            return Err(RigletError::Protocol(format!(
                "worker state for device {} is unverified",
                uuid
            )));
        };

        if entry.owner.is_some() {
            match self.shared.client.algorithm_destroy(worker_id).await {
                Ok(()) => self.shared.registry.write().await.detach_owner(uuid),
                Err(e) => {
                    self.poison_on_connection_failure(uuid, &e).await;
                    return Err(e);
                }
            }
        }

        match self.shared.client.worker_free(worker_id).await {
            Ok(()) => {
                self.shared.registry.write().await.remove(uuid);
                info!(device = uuid, worker = worker_id, "Worker freed");
                Ok(())
            }
            Err(e) => {
                self.poison_on_connection_failure(uuid, &e).await;
                Err(e)
            }
        }
    }

    /// Create a worker on the device and attach this workload to it
    async fn bring_up(&self, uuid: &str) -> RigletResult<()> {
        let worker_id = match self.shared.client.worker_add(uuid).await {
            Ok(worker_id) => worker_id,
            Err(e) => {
                self.poison_on_connection_failure(uuid, &e).await;
                return Err(e);
            }
        };
        self.shared
            .registry
            .write()
            .await
            .insert(uuid.to_string(), WorkerEntry::confirmed(worker_id, None));

        match self
            .shared
            .client
            .algorithm_add(worker_id, &self.spec.names)
            .await
        {
            Ok(()) => {
                self.shared
                    .registry
                    .write()
                    .await
                    .attach_owner(uuid, self.spec.key());
                info!(device = uuid, worker = worker_id, workload = %self.spec, "Worker assigned");
                Ok(())
            }
            Err(e) => {
                if e.is_connection_failure() {
                    self.shared.registry.write().await.mark_unverified(uuid);
                    return Err(e);
                }
                // The worker exists but carries no workload; free it so a
                // rejected attach does not leak an idle worker.
                warn!(device = uuid, worker = worker_id, error = %e, "Attach rejected; rolling back worker");
                match self.shared.client.worker_free(worker_id).await {
                    Ok(()) => {
                        self.shared.registry.write().await.remove(uuid);
                    }
                    Err(free_err) => {
                        self.poison_on_connection_failure(uuid, &free_err).await;
                        warn!(device = uuid, error = %free_err, "Rollback failed");
                    }
                }
                Err(e)
            }
        }
    }

    async fn poison_on_connection_failure(&self, uuid: &str, error: &RigletError) {
        if error.is_connection_failure() {
            self.shared.registry.write().await.mark_unverified(uuid);
        }
    }
}
