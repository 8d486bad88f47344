//! Per-identity mutual exclusion.
//!
//! The pipeline assumes at most one sync in flight per identity. Rather
//! than trusting the host scheduler, the engine takes an explicit keyed
//! lock: concurrent syncs for the same identity serialize, while
//! different identities proceed independently (no resource is shared
//! across identities).

use parking_lot::Mutex;
use roost_core::Identity;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Keyed async locks, one per identity.
#[derive(Default)]
pub struct IdentityLocks {
    inner: Mutex<HashMap<Identity, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one identity, waiting if a sync for it is
    /// already running. The guard releases on drop.
    pub async fn acquire(&self, identity: &Identity) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock();
            map.entry(identity.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
