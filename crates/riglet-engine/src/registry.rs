//! Worker registry: the engine's mirror of daemon worker state
//!
//! The registry maps device uuids to the worker the engine believes is
//! live on that device. Entries are mutated only after a remote command
//! confirms, never speculatively. A connection-level failure mid-sequence
//! leaves the affected entry marked unverified; it must be reconciled
//! against a fresh `worker.list` before it is trusted again.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Ownership key of a workload: its sub-algorithm names joined with `_`
pub type WorkloadKey = String;

/// A worker the engine believes exists on a device
#[derive(Debug, Clone)]
pub struct WorkerEntry {
    /// Daemon-assigned worker id; None while the entry is an unverified
    /// placeholder whose remote state has not been observed yet
    pub worker_id: Option<u64>,
    /// Workload the worker runs; None for a worker with nothing attached
    pub owner: Option<WorkloadKey>,
    /// Whether the entry reflects a confirmed remote exchange
    pub verified: bool,
    /// When the entry was last written
    pub assigned_at: DateTime<Utc>,
}

impl WorkerEntry {
    /// Entry for a worker confirmed by a successful `worker.add`
    pub fn confirmed(worker_id: u64, owner: Option<WorkloadKey>) -> Self {
        Self {
            worker_id: Some(worker_id),
            owner,
            verified: true,
            assigned_at: Utc::now(),
        }
    }

    /// Placeholder for a device whose remote state is unknown
    pub fn unknown() -> Self {
        Self {
            worker_id: None,
            owner: None,
            verified: false,
            assigned_at: Utc::now(),
        }
    }
}

/// Mirror of which devices currently have a live worker
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    entries: HashMap<String, WorkerEntry>,
}

impl WorkerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for a device, if the engine believes a worker exists there
    pub fn get(&self, device_uuid: &str) -> Option<&WorkerEntry> {
        self.entries.get(device_uuid)
    }

    /// Workload currently owning the device, if any
    pub fn owner_of(&self, device_uuid: &str) -> Option<&WorkloadKey> {
        self.entries.get(device_uuid).and_then(|e| e.owner.as_ref())
    }

    /// Devices owned by the given workload, sorted by uuid
    pub fn devices_owned_by(&self, key: &str) -> Vec<String> {
        let mut devices: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.owner.as_deref() == Some(key))
            .map(|(uuid, _)| uuid.clone())
            .collect();
        devices.sort();
        devices
    }

    /// Record a confirmed entry for a device
    pub fn insert(&mut self, device_uuid: String, entry: WorkerEntry) {
        debug!(
            device = %device_uuid,
            worker = ?entry.worker_id,
            owner = entry.owner.as_deref().unwrap_or("-"),
            "Registry insert"
        );
        self.entries.insert(device_uuid, entry);
    }

    /// Delete a device's entry after its worker was confirmed freed
    pub fn remove(&mut self, device_uuid: &str) -> Option<WorkerEntry> {
        let removed = self.entries.remove(device_uuid);
        if removed.is_some() {
            debug!(device = %device_uuid, "Registry remove");
        }
        removed
    }

    /// Detach the owner from a device's entry (confirmed
    /// `algorithm.destroy`, worker still live)
    pub fn detach_owner(&mut self, device_uuid: &str) {
        if let Some(entry) = self.entries.get_mut(device_uuid) {
            entry.owner = None;
            entry.assigned_at = Utc::now();
        }
    }

    /// Attach a workload to a device's entry (confirmed `algorithm.add`)
    pub fn attach_owner(&mut self, device_uuid: &str, key: WorkloadKey) {
        if let Some(entry) = self.entries.get_mut(device_uuid) {
            entry.owner = Some(key);
            entry.assigned_at = Utc::now();
        }
    }

    /// Mark a device's remote state as unknown; creates a placeholder
    /// entry if none exists so the device is re-verified before use
    pub fn mark_unverified(&mut self, device_uuid: &str) {
        self.entries
            .entry(device_uuid.to_string())
            .and_modify(|e| e.verified = false)
            .or_insert_with(WorkerEntry::unknown);
    }

    /// Devices among `scope` whose entries are unverified
    pub fn unverified_in<'a>(&self, scope: impl Iterator<Item = &'a String>) -> Vec<String> {
        scope
            .filter(|uuid| self.entries.get(*uuid).is_some_and(|e| !e.verified))
            .cloned()
            .collect()
    }

    /// Reconcile a device against a fresh `worker.list` observation:
    /// `Some((worker_id, names))` if a worker was seen on the device,
    /// `None` if not
    pub fn apply_observation(&mut self, device_uuid: &str, observed: Option<(u64, Vec<String>)>) {
        match observed {
            Some((worker_id, names)) => {
                let owner = if names.is_empty() {
                    None
                } else {
                    Some(names.join("_"))
                };
                debug!(
                    device = %device_uuid,
                    worker = worker_id,
                    owner = owner.as_deref().unwrap_or("-"),
                    "Registry verified against worker.list"
                );
                self.entries
                    .insert(device_uuid.to_string(), WorkerEntry::confirmed(worker_id, owner));
            }
            None => {
                debug!(device = %device_uuid, "No remote worker; dropping entry");
                self.entries.remove(device_uuid);
            }
        }
    }

    /// Forget everything (a fresh daemon instance has no workers)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of devices with a live worker
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no device has a worker
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
