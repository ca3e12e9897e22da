use std::collections::HashMap;
use std::sync::Arc;

use stg_models::{BackendKind, BackendSpec, DesiredState, ResourceIdentity};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// What was last applied for one (resource, backend kind) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub spec: BackendSpec,
    pub desired: DesiredState,
}

type Key = (ResourceIdentity, BackendKind);

/// Last-applied state per resource and backend kind. Only used to skip
/// passes whose desired state has not moved; a miss always falls through to
/// the backend's live state.
#[derive(Clone, Default)]
pub struct StateCache {
    entries: Arc<RwLock<HashMap<Key, CacheEntry>>>,
    pass_locks: Arc<Mutex<HashMap<ResourceIdentity, Arc<Mutex<()>>>>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes passes for one resource. Hold the guard for the whole
    /// read-compare-apply-store sequence.
    pub async fn lock(&self, id: &ResourceIdentity) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.pass_locks.lock().await;
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forgets the pass lock for `id` unless a pass holds it or waits on it.
    /// A later `lock` for the same identity creates a fresh one.
    pub async fn release(&self, id: &ResourceIdentity) {
        let mut locks = self.pass_locks.lock().await;
        if locks.get(id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(id);
        }
    }

    /// Number of identities with a pass lock.
    pub async fn tracked_locks(&self) -> usize {
        self.pass_locks.lock().await.len()
    }

    pub async fn get(
        &self,
        id: &ResourceIdentity,
        kind: BackendKind,
    ) -> Option<CacheEntry> {
        let r = self.entries.read().await;
        r.get(&(id.clone(), kind)).cloned()
    }

    /// True when the same desired state was already applied to the same
    /// backend target.
    pub async fn is_current(
        &self,
        id: &ResourceIdentity,
        spec: &BackendSpec,
        desired: &DesiredState,
    ) -> bool {
        let r = self.entries.read().await;
        r.get(&(id.clone(), spec.kind()))
            .map(|e| e.spec == *spec && e.desired == *desired)
            .unwrap_or(false)
    }

    pub async fn store(
        &self,
        id: &ResourceIdentity,
        spec: BackendSpec,
        desired: DesiredState,
    ) {
        let mut w = self.entries.write().await;
        w.insert((id.clone(), spec.kind()), CacheEntry { spec, desired });
    }

    pub async fn evict(
        &self,
        id: &ResourceIdentity,
        kind: BackendKind,
    ) -> Option<CacheEntry> {
        let mut w = self.entries.write().await;
        w.remove(&(id.clone(), kind))
    }

    /// Removes the entries of every backend kind for `id`.
    pub async fn evict_all(
        &self,
        id: &ResourceIdentity,
    ) -> Vec<(BackendKind, CacheEntry)> {
        let mut w = self.entries.write().await;
        BackendKind::ALL
            .into_iter()
            .filter_map(|kind| w.remove(&(id.clone(), kind)).map(|e| (kind, e)))
            .collect()
    }

    pub async fn contains(&self, id: &ResourceIdentity) -> bool {
        let r = self.entries.read().await;
        BackendKind::ALL
            .into_iter()
            .any(|kind| r.contains_key(&(id.clone(), kind)))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
