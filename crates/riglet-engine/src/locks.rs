//! Per-device mutual exclusion
//!
//! Two callers reconciling the same device must not interleave their
//! registry reads with the remote command sequence; callers touching
//! disjoint devices proceed without coordination. Locks are acquired in
//! sorted uuid order so overlapping multi-device calls cannot deadlock.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per device uuid, created on first use
#[derive(Default)]
pub struct DeviceLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, uuid: &str) -> Arc<Mutex<()>> {
        let mut table = self.inner.lock().await;
        table
            .entry(uuid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire every device in the set; the guards release on drop
    ///
    /// The set is ordered, so concurrent callers acquire overlapping
    /// devices in the same order.
    pub async fn acquire(&self, uuids: &BTreeSet<String>) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            let lock = self.lock_for(uuid).await;
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}
