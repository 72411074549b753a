//! Authoritative in-memory grant state.
//!
//! Holds one [`Grant`] per (principal, capability) and the key-scoped locks
//! that serialize every read-modify-write on a key. The store never cancels
//! timers itself: callers take [`GrantStore::lock`], then remove, cancel and
//! put in that order.
//!
//! Lock entries are created on demand and reclaimed by
//! [`GrantStore::prune_idle_locks`].

use super::types::{Capability, Grant, GrantId, GrantKey, Principal};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard for a key's critical section.
pub type KeyGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct GrantStore {
    grants: DashMap<GrantKey, Grant>,
    locks: DashMap<GrantKey, Arc<Mutex<()>>>,
}

impl GrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the critical section for `key`. Unrelated keys never contend.
    pub async fn lock(&self, key: GrantKey) -> KeyGuard {
        // Clone the Arc out so the shard guard drops before awaiting
        let mutex = self.locks.entry(key).or_default().value().clone();
        mutex.lock_owned().await
    }

    /// Insert a grant, returning whatever it replaced.
    pub fn put(&self, grant: Grant) -> Option<Grant> {
        self.grants.insert(grant.key, grant)
    }

    pub fn remove(&self, key: &GrantKey) -> Option<Grant> {
        self.grants.remove(key).map(|(_, grant)| grant)
    }

    /// Remove the grant only if it is still the one identified by `id`.
    pub fn remove_if_current(&self, key: &GrantKey, id: GrantId) -> Option<Grant> {
        self.grants
            .remove_if(key, |_, grant| grant.id == id)
            .map(|(_, grant)| grant)
    }

    pub fn get(&self, key: &GrantKey) -> Option<Grant> {
        self.grants.get(key).map(|r| r.value().clone())
    }

    pub fn count(&self) -> usize {
        self.grants.len()
    }

    /// Active grant counts per capability, including zero entries.
    pub fn count_by_kind(&self) -> BTreeMap<Capability, usize> {
        let mut counts: BTreeMap<Capability, usize> =
            Capability::ALL.iter().map(|c| (*c, 0)).collect();
        for entry in self.grants.iter() {
            *counts.entry(entry.key().capability).or_insert(0) += 1;
        }
        counts
    }

    /// Whether `principal` holds any active grant.
    pub fn holds_any(&self, principal: Principal) -> bool {
        Capability::ALL
            .iter()
            .any(|c| self.grants.contains_key(&GrantKey::new(principal, *c)))
    }

    /// Drop lock entries nobody is holding or waiting on.
    pub fn prune_idle_locks(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before - self.locks.len()
    }

    #[cfg(test)]
    pub(crate) fn lock_entries(&self) -> usize {
        self.locks.len()
    }
}
